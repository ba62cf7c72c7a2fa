use crate::storage::entity::notification::{
    ActiveModel as NotificationActiveModel, Column as NotificationColumn,
    Entity as Notification, Model as NotificationModel,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

pub struct NotificationRepository;

impl NotificationRepository {
    pub async fn insert<C: ConnectionTrait>(
        db: &C,
        user_id: i32,
        kind: &str,
        title: String,
        message: String,
        kpi_id: Option<i32>,
    ) -> Result<NotificationModel, sea_orm::DbErr> {
        let active_model = NotificationActiveModel {
            user_id: Set(user_id),
            kind: Set(kind.to_string()),
            title: Set(title),
            message: Set(message),
            kpi_id: Set(kpi_id),
            is_read: Set(false),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };
        active_model.insert(db).await
    }

    pub async fn list_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: i32,
        unread_only: bool,
        limit: u64,
    ) -> Result<Vec<NotificationModel>, sea_orm::DbErr> {
        let mut query = Notification::find().filter(NotificationColumn::UserId.eq(user_id));
        if unread_only {
            query = query.filter(NotificationColumn::IsRead.eq(false));
        }
        query
            .order_by_desc(NotificationColumn::CreatedAt)
            .order_by_desc(NotificationColumn::Id)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn unread_count<C: ConnectionTrait>(
        db: &C,
        user_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        Notification::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .count(db)
            .await
    }

    /// Returns the number of rows touched; 0 when the id does not belong to the user.
    pub async fn mark_read<C: ConnectionTrait>(
        db: &C,
        id: i32,
        user_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let res = Notification::update_many()
            .col_expr(NotificationColumn::IsRead, Expr::value(true))
            .filter(NotificationColumn::Id.eq(id))
            .filter(NotificationColumn::UserId.eq(user_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn mark_all_read<C: ConnectionTrait>(
        db: &C,
        user_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let res = Notification::update_many()
            .col_expr(NotificationColumn::IsRead, Expr::value(true))
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}
