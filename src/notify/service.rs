use crate::error::{OkrError, OkrResult};
use crate::notify::sink::NotificationSink;
use crate::session::Actor;
use crate::storage::entity::notification::Model as NotificationModel;
use crate::storage::repository::NotificationRepository;
use log::warn;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

const LIST_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    KpiApproved,
    KpiRejected,
    KpiComment,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KpiApproved => "kpi_approved",
            Self::KpiRejected => "kpi_rejected",
            Self::KpiComment => "kpi_comment",
        }
    }
}

pub struct NotificationService {
    db: Arc<DatabaseConnection>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationService {
    pub fn new(db: Arc<DatabaseConnection>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { db, sink }
    }

    /// Stores the notification and hands it to the sink. Never fails the
    /// caller: storage and delivery problems are logged.
    pub async fn notify(
        &self,
        user_id: i32,
        kind: NotificationKind,
        title: String,
        message: String,
        kpi_id: Option<i32>,
    ) -> Option<NotificationModel> {
        let stored = match NotificationRepository::insert(
            self.db.as_ref(),
            user_id,
            kind.as_str(),
            title,
            message,
            kpi_id,
        )
        .await
        {
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to store {} notification for user {}: {}", kind.as_str(), user_id, e);
                return None;
            }
        };

        if let Err(e) = self.sink.deliver(&stored).await {
            warn!("Notification {} delivery failed: {:#}", stored.id, e);
        }
        Some(stored)
    }

    pub async fn list(&self, actor: &Actor, unread_only: bool) -> OkrResult<Vec<NotificationModel>> {
        Ok(NotificationRepository::list_for_user(
            self.db.as_ref(),
            actor.user_id,
            unread_only,
            LIST_LIMIT,
        )
        .await?)
    }

    pub async fn unread_count(&self, actor: &Actor) -> OkrResult<u64> {
        Ok(NotificationRepository::unread_count(self.db.as_ref(), actor.user_id).await?)
    }

    pub async fn mark_read(&self, actor: &Actor, id: i32) -> OkrResult<()> {
        let touched = NotificationRepository::mark_read(self.db.as_ref(), id, actor.user_id).await?;
        if touched == 0 {
            return Err(OkrError::not_found("notification", id));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> OkrResult<u64> {
        Ok(NotificationRepository::mark_all_read(self.db.as_ref(), actor.user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use crate::storage::connection::memory_db;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink(AtomicUsize);

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _n: &NotificationModel) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("smtp down")
        }
    }

    #[tokio::test]
    async fn sink_failures_do_not_lose_the_notification() {
        let db = Arc::new(memory_db().await);
        let sink = Arc::new(FailingSink(AtomicUsize::new(0)));
        let service = NotificationService::new(db, sink.clone());
        let owner = Actor::new(7, Role::Employee);

        let stored = service
            .notify(7, NotificationKind::KpiApproved, "approved".into(), "ok".into(), Some(1))
            .await;
        assert!(stored.is_some());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert_eq!(service.unread_count(&owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn users_only_mark_their_own_notifications() {
        let db = Arc::new(memory_db().await);
        let service = NotificationService::new(db, Arc::new(crate::notify::LogSink));
        let owner = Actor::new(7, Role::Employee);
        let other = Actor::new(8, Role::Employee);

        let n = service
            .notify(7, NotificationKind::KpiComment, "c".into(), "m".into(), None)
            .await
            .unwrap();
        service
            .notify(7, NotificationKind::KpiRejected, "r".into(), "m".into(), None)
            .await
            .unwrap();

        assert!(matches!(
            service.mark_read(&other, n.id).await,
            Err(OkrError::NotFound { .. })
        ));
        service.mark_read(&owner, n.id).await.unwrap();
        assert_eq!(service.unread_count(&owner).await.unwrap(), 1);
        assert_eq!(service.list(&owner, true).await.unwrap().len(), 1);
        assert_eq!(service.mark_all_read(&owner).await.unwrap(), 1);
        assert_eq!(service.unread_count(&owner).await.unwrap(), 0);
        assert_eq!(service.list(&owner, false).await.unwrap().len(), 2);
    }
}
