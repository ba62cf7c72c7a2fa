use crate::storage::entity::objective_kpi_link::{
    ActiveModel as LinkActiveModel, Column as LinkColumn, Entity as ObjectiveKpiLink,
    Model as LinkModel,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

pub struct LinkRepository;

impl LinkRepository {
    pub async fn find<C: ConnectionTrait>(
        db: &C,
        objective_id: i32,
        kpi_id: i32,
    ) -> Result<Option<LinkModel>, sea_orm::DbErr> {
        ObjectiveKpiLink::find()
            .filter(LinkColumn::ObjectiveId.eq(objective_id))
            .filter(LinkColumn::KpiId.eq(kpi_id))
            .one(db)
            .await
    }

    pub async fn insert<C: ConnectionTrait>(
        db: &C,
        objective_id: i32,
        kpi_id: i32,
        weight: f64,
    ) -> Result<LinkModel, sea_orm::DbErr> {
        let active_model = LinkActiveModel {
            objective_id: Set(objective_id),
            kpi_id: Set(kpi_id),
            weight: Set(weight),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };
        active_model.insert(db).await
    }

    pub async fn update_weight<C: ConnectionTrait>(
        db: &C,
        objective_id: i32,
        kpi_id: i32,
        weight: f64,
    ) -> Result<u64, sea_orm::DbErr> {
        let res = ObjectiveKpiLink::update_many()
            .col_expr(LinkColumn::Weight, Expr::value(weight))
            .filter(LinkColumn::ObjectiveId.eq(objective_id))
            .filter(LinkColumn::KpiId.eq(kpi_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        objective_id: i32,
        kpi_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let res = ObjectiveKpiLink::delete_many()
            .filter(LinkColumn::ObjectiveId.eq(objective_id))
            .filter(LinkColumn::KpiId.eq(kpi_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn list_for_objective<C: ConnectionTrait>(
        db: &C,
        objective_id: i32,
    ) -> Result<Vec<LinkModel>, sea_orm::DbErr> {
        ObjectiveKpiLink::find()
            .filter(LinkColumn::ObjectiveId.eq(objective_id))
            .order_by_asc(LinkColumn::KpiId)
            .all(db)
            .await
    }

    pub async fn list_for_kpi<C: ConnectionTrait>(
        db: &C,
        kpi_id: i32,
    ) -> Result<Vec<LinkModel>, sea_orm::DbErr> {
        ObjectiveKpiLink::find()
            .filter(LinkColumn::KpiId.eq(kpi_id))
            .order_by_asc(LinkColumn::ObjectiveId)
            .all(db)
            .await
    }

    pub async fn count_for_objective<C: ConnectionTrait>(
        db: &C,
        objective_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        ObjectiveKpiLink::find()
            .filter(LinkColumn::ObjectiveId.eq(objective_id))
            .count(db)
            .await
    }

    pub async fn delete_for_objectives<C: ConnectionTrait>(
        db: &C,
        objective_ids: Vec<i32>,
    ) -> Result<u64, sea_orm::DbErr> {
        if objective_ids.is_empty() {
            return Ok(0);
        }
        let res = ObjectiveKpiLink::delete_many()
            .filter(LinkColumn::ObjectiveId.is_in(objective_ids))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn delete_for_kpi<C: ConnectionTrait>(
        db: &C,
        kpi_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let res = ObjectiveKpiLink::delete_many()
            .filter(LinkColumn::KpiId.eq(kpi_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}
