use crate::objective::model::{CreateObjectiveRequest, ObjectiveFilter, ObjectiveStatus};
use crate::storage::entity::objective::{
    self, ActiveModel as ObjectiveActiveModel, Column as ObjectiveColumn, Entity as Objective,
    Model as ObjectiveModel,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

pub const MAX_PAGE: u64 = 500;

pub struct ObjectiveRepository;

impl ObjectiveRepository {
    pub async fn insert<C: ConnectionTrait>(
        db: &C,
        req: &CreateObjectiveRequest,
        created_by: i32,
    ) -> Result<ObjectiveModel, sea_orm::DbErr> {
        let now = Utc::now().timestamp();
        let manual = req.manual_progress.unwrap_or(0.0);
        let active_model = ObjectiveActiveModel {
            title: Set(req.title.trim().to_string()),
            description: Set(req.description.clone()),
            level: Set(req.level.as_str().to_string()),
            parent_id: Set(req.parent_id),
            owner_id: Set(req.owner_id),
            department: Set(req.department.clone()),
            year: Set(req.year),
            period: Set(req.period.as_str().to_string()),
            status: Set(req
                .status
                .unwrap_or(ObjectiveStatus::Active)
                .as_str()
                .to_string()),
            manual_progress: Set(manual),
            progress: Set(manual),
            is_featured: Set(req.is_featured.unwrap_or(false)),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active_model.insert(db).await
    }

    pub async fn find<C: ConnectionTrait>(
        db: &C,
        id: i32,
    ) -> Result<Option<ObjectiveModel>, sea_orm::DbErr> {
        Objective::find_by_id(id).one(db).await
    }

    pub async fn load_all<C: ConnectionTrait>(
        db: &C,
    ) -> Result<Vec<ObjectiveModel>, sea_orm::DbErr> {
        Objective::find()
            .order_by_asc(ObjectiveColumn::Id)
            .all(db)
            .await
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        filter: &ObjectiveFilter,
    ) -> Result<(Vec<ObjectiveModel>, u64), sea_orm::DbErr> {
        let mut query = Objective::find();
        if let Some(level) = filter.level {
            query = query.filter(ObjectiveColumn::Level.eq(level.as_str()));
        }
        if let Some(year) = filter.year {
            query = query.filter(ObjectiveColumn::Year.eq(year));
        }
        if let Some(period) = filter.period {
            query = query.filter(ObjectiveColumn::Period.eq(period.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(ObjectiveColumn::Status.eq(status.as_str()));
        }
        if let Some(ref department) = filter.department {
            query = query.filter(ObjectiveColumn::Department.eq(department.clone()));
        }
        if let Some(owner_id) = filter.owner_id {
            query = query.filter(ObjectiveColumn::OwnerId.eq(owner_id));
        }
        if let Some(parent_id) = filter.parent_id {
            query = query.filter(ObjectiveColumn::ParentId.eq(parent_id));
        }

        let total = query.clone().count(db).await?;
        let items = query
            .order_by_asc(ObjectiveColumn::Id)
            .offset(filter.offset.unwrap_or(0))
            .limit(filter.limit.unwrap_or(100).min(MAX_PAGE))
            .all(db)
            .await?;
        Ok((items, total))
    }

    pub async fn children<C: ConnectionTrait>(
        db: &C,
        parent_id: i32,
    ) -> Result<Vec<ObjectiveModel>, sea_orm::DbErr> {
        Objective::find()
            .filter(ObjectiveColumn::ParentId.eq(parent_id))
            .order_by_asc(ObjectiveColumn::Id)
            .all(db)
            .await
    }

    pub async fn count_children<C: ConnectionTrait>(
        db: &C,
        parent_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        Objective::find()
            .filter(ObjectiveColumn::ParentId.eq(parent_id))
            .count(db)
            .await
    }

    /// Writes every column of `model` back.
    pub async fn save<C: ConnectionTrait>(
        db: &C,
        mut model: ObjectiveModel,
    ) -> Result<ObjectiveModel, sea_orm::DbErr> {
        model.updated_at = Utc::now().timestamp();
        ObjectiveActiveModel::from(model).reset_all().update(db).await
    }

    pub async fn set_parent<C: ConnectionTrait>(
        db: &C,
        id: i32,
        parent_id: Option<i32>,
    ) -> Result<(), sea_orm::DbErr> {
        let now = Utc::now().timestamp();
        Objective::update_many()
            .col_expr(ObjectiveColumn::ParentId, Expr::value(parent_id))
            .col_expr(ObjectiveColumn::UpdatedAt, Expr::value(now))
            .filter(ObjectiveColumn::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn set_progress<C: ConnectionTrait>(
        db: &C,
        id: i32,
        progress: f64,
    ) -> Result<(), sea_orm::DbErr> {
        let now = Utc::now().timestamp();
        Objective::update_many()
            .col_expr(ObjectiveColumn::Progress, Expr::value(progress))
            .col_expr(ObjectiveColumn::UpdatedAt, Expr::value(now))
            .filter(ObjectiveColumn::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn delete_many<C: ConnectionTrait>(
        db: &C,
        ids: Vec<i32>,
    ) -> Result<u64, sea_orm::DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }
        let res = Objective::delete_many()
            .filter(objective::Column::Id.is_in(ids))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}
