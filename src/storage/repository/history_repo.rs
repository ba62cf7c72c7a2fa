use crate::storage::entity::kpi_history::{
    ActiveModel as HistoryActiveModel, Column as HistoryColumn, Entity as KpiHistory,
    Model as HistoryModel,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};

pub struct HistoryRepository;

impl HistoryRepository {
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        kpi_id: i32,
        user_id: i32,
        action: &str,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Result<(), sea_orm::DbErr> {
        let active_model = HistoryActiveModel {
            kpi_id: Set(kpi_id),
            user_id: Set(user_id),
            action: Set(action.to_string()),
            old_value: Set(old_value),
            new_value: Set(new_value),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };
        active_model.insert(db).await?;
        Ok(())
    }

    /// Oldest first, so the list reads as a timeline.
    pub async fn list_for_kpi<C: ConnectionTrait>(
        db: &C,
        kpi_id: i32,
    ) -> Result<Vec<HistoryModel>, sea_orm::DbErr> {
        KpiHistory::find()
            .filter(HistoryColumn::KpiId.eq(kpi_id))
            .order_by_asc(HistoryColumn::Id)
            .all(db)
            .await
    }
}
