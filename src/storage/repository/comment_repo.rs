use crate::storage::entity::kpi_comment::{
    ActiveModel as CommentActiveModel, Column as CommentColumn, Entity as KpiComment,
    Model as CommentModel,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};

pub struct CommentRepository;

impl CommentRepository {
    pub async fn insert<C: ConnectionTrait>(
        db: &C,
        kpi_id: i32,
        user_id: i32,
        body: &str,
    ) -> Result<CommentModel, sea_orm::DbErr> {
        let active_model = CommentActiveModel {
            kpi_id: Set(kpi_id),
            user_id: Set(user_id),
            body: Set(body.trim().to_string()),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };
        active_model.insert(db).await
    }

    pub async fn find<C: ConnectionTrait>(
        db: &C,
        id: i32,
    ) -> Result<Option<CommentModel>, sea_orm::DbErr> {
        KpiComment::find_by_id(id).one(db).await
    }

    /// Newest first.
    pub async fn list_for_kpi<C: ConnectionTrait>(
        db: &C,
        kpi_id: i32,
    ) -> Result<Vec<CommentModel>, sea_orm::DbErr> {
        KpiComment::find()
            .filter(CommentColumn::KpiId.eq(kpi_id))
            .order_by_desc(CommentColumn::CreatedAt)
            .order_by_desc(CommentColumn::Id)
            .all(db)
            .await
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: i32) -> Result<u64, sea_orm::DbErr> {
        let res = KpiComment::delete_by_id(id).exec(db).await?;
        Ok(res.rows_affected)
    }

    pub async fn delete_for_kpi<C: ConnectionTrait>(
        db: &C,
        kpi_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let res = KpiComment::delete_many()
            .filter(CommentColumn::KpiId.eq(kpi_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}
