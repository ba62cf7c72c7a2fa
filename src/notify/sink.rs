use crate::storage::entity::notification::Model as NotificationModel;
use async_trait::async_trait;
use log::info;

/// Outbound delivery of stored notifications (mail, push, chat...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &NotificationModel) -> anyhow::Result<()>;
}

/// Default sink: the notification row is the only delivery.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, n: &NotificationModel) -> anyhow::Result<()> {
        info!(
            "Notification {} [{}] for user {}: {}",
            n.id, n.kind, n.user_id, n.title
        );
        Ok(())
    }
}
