use crate::error::{OkrError, OkrResult};
use crate::kpi::model::Comment;
use crate::kpi::service::{authorize_view, KpiService};
use crate::notify::NotificationKind;
use crate::session::Actor;
use crate::storage::repository::CommentRepository;
use log::info;

const MAX_COMMENT_LEN: usize = 5000;

impl KpiService {
    pub async fn add_comment(&self, actor: &Actor, kpi_id: i32, body: &str) -> OkrResult<Comment> {
        let body = body.trim();
        if body.is_empty() {
            return Err(OkrError::validation("comment must not be empty"));
        }
        if body.chars().count() > MAX_COMMENT_LEN {
            return Err(OkrError::validation(format!(
                "comment longer than {} characters",
                MAX_COMMENT_LEN
            )));
        }
        let kpi = self.require(kpi_id).await?;
        authorize_view(actor, &kpi)?;

        let comment = CommentRepository::insert(self.db.as_ref(), kpi_id, actor.user_id, body).await?;
        info!("User {} commented on kpi {}", actor.user_id, kpi_id);

        if !actor.owns(kpi.owner_id) {
            self.notifications
                .notify(
                    kpi.owner_id,
                    NotificationKind::KpiComment,
                    format!("New comment on {}", kpi.title),
                    body.chars().take(200).collect(),
                    Some(kpi_id),
                )
                .await;
        }
        Ok(comment)
    }

    pub async fn comments(&self, actor: &Actor, kpi_id: i32) -> OkrResult<Vec<Comment>> {
        let kpi = self.require(kpi_id).await?;
        authorize_view(actor, &kpi)?;
        Ok(CommentRepository::list_for_kpi(self.db.as_ref(), kpi_id).await?)
    }

    /// Author or admin.
    pub async fn delete_comment(&self, actor: &Actor, comment_id: i32) -> OkrResult<()> {
        let comment = CommentRepository::find(self.db.as_ref(), comment_id)
            .await?
            .ok_or_else(|| OkrError::not_found("comment", comment_id))?;
        if !actor.owns(comment.user_id) && !actor.is_admin() {
            return Err(OkrError::forbidden(format!(
                "user {} may not delete comment {}",
                actor.user_id, comment_id
            )));
        }
        CommentRepository::delete(self.db.as_ref(), comment_id).await?;
        info!("Deleted comment {} on kpi {}", comment_id, comment.kpi_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::app_state::tests::test_state;
    use crate::error::OkrError;
    use crate::kpi::model::{CreateKpiRequest, Quarter};
    use crate::session::{Actor, Role};
    use crate::storage::repository::NotificationRepository;

    #[tokio::test]
    async fn reviewer_comments_notify_the_owner() {
        let state = test_state().await;
        let owner = Actor::new(10, Role::Employee);
        let manager = Actor::new(20, Role::Manager);
        let kpi = state
            .kpis
            .create(
                &owner,
                CreateKpiRequest {
                    title: "uptime".to_string(),
                    description: None,
                    category: None,
                    year: 2025,
                    quarter: Quarter::Q1,
                    target_value: None,
                    current_value: None,
                    progress_percentage: Some(99.0),
                },
            )
            .await
            .unwrap();

        let err = state.kpis.add_comment(&manager, kpi.id, "  ").await.unwrap_err();
        assert!(matches!(err, OkrError::ValidationError(_)));

        state.kpis.add_comment(&owner, kpi.id, "self note").await.unwrap();
        let c = state
            .kpis
            .add_comment(&manager, kpi.id, "please add evidence")
            .await
            .unwrap();

        let unread = NotificationRepository::unread_count(state.db.as_ref(), 10).await.unwrap();
        assert_eq!(unread, 1);

        let comments = state.kpis.comments(&owner, kpi.id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].id, c.id);

        let err = state.kpis.delete_comment(&owner, c.id).await.unwrap_err();
        assert!(matches!(err, OkrError::Forbidden(_)));
        state.kpis.delete_comment(&manager, c.id).await.unwrap();
        assert_eq!(state.kpis.comments(&owner, kpi.id).await.unwrap().len(), 1);
    }
}
