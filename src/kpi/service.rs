use crate::error::{OkrError, OkrResult};
use crate::kpi::approval::{self, ApprovalAction};
use crate::kpi::model::{
    derive_progress, kpis_from_models, CreateKpiRequest, HistoryEntry, Kpi, KpiFilter, KpiPage,
    KpiStatistics, KpiStatus, LinkView, ProgressUpdateRequest, UpdateKpiRequest,
};
use crate::notify::{NotificationKind, NotificationService};
use crate::objective::model::{validate_percentage, validate_title, validate_year};
use crate::progress::ProgressService;
use crate::session::Actor;
use crate::storage::entity::kpi::{Column as KpiColumn, Model as KpiModel};
use crate::storage::repository::objective_repo::MAX_PAGE;
use crate::storage::repository::{
    CommentRepository, HistoryRepository, KpiRepository, LinkRepository,
};
use chrono::Utc;
use log::{info, warn};
use sea_orm::{DatabaseConnection, TransactionTrait, Value};
use std::sync::Arc;

pub struct KpiService {
    pub(super) db: Arc<DatabaseConnection>,
    progress: Arc<ProgressService>,
    pub(super) notifications: Arc<NotificationService>,
    recalc_on_review: bool,
}

pub(super) fn authorize_view(actor: &Actor, kpi: &KpiModel) -> OkrResult<()> {
    if actor.is_reviewer() || actor.owns(kpi.owner_id) {
        return Ok(());
    }
    Err(OkrError::forbidden(format!(
        "user {} may not view kpi {}",
        actor.user_id, kpi.id
    )))
}

fn describe_progress(current_value: Option<&str>, progress: Option<f64>) -> Option<String> {
    let pct = progress
        .map(|p| format!("{:.2}%", p))
        .unwrap_or_else(|| "-".to_string());
    Some(match current_value {
        Some(cur) => format!("{} ({})", pct, cur),
        None => pct,
    })
}

/// One audited write: the columns to set and the history row to go with them.
struct KpiChange {
    columns: Vec<(KpiColumn, Value)>,
    action: &'static str,
    old_value: Option<String>,
    new_value: Option<String>,
}

impl KpiService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        progress: Arc<ProgressService>,
        notifications: Arc<NotificationService>,
        recalc_on_review: bool,
    ) -> Self {
        Self {
            db,
            progress,
            notifications,
            recalc_on_review,
        }
    }

    pub(super) async fn require(&self, id: i32) -> OkrResult<KpiModel> {
        KpiRepository::find(self.db.as_ref(), id)
            .await?
            .ok_or_else(|| OkrError::not_found("kpi", id))
    }

    fn status_of(model: &KpiModel) -> OkrResult<KpiStatus> {
        model.status.parse().map_err(|e: String| {
            OkrError::Database(sea_orm::DbErr::Type(format!("kpi {}: {}", model.id, e)))
        })
    }

    /// Writes the change and its audit entry in one transaction. With a
    /// guard the write only lands while the row is still in the status the
    /// caller checked; otherwise it fails as an invalid transition.
    async fn apply(
        &self,
        actor: &Actor,
        id: i32,
        guard: Option<(ApprovalAction, KpiStatus)>,
        change: KpiChange,
    ) -> OkrResult<Kpi> {
        let txn = self.db.begin().await?;
        let expected = guard.map(|(_, from)| from);
        let written = KpiRepository::update_columns(&txn, id, expected, change.columns).await?;
        if written == 0 {
            txn.rollback().await?;
            return Err(self.stale_write(id, guard).await);
        }
        HistoryRepository::record(
            &txn,
            id,
            actor.user_id,
            change.action,
            change.old_value,
            change.new_value,
        )
        .await?;
        let saved = KpiRepository::find(&txn, id)
            .await?
            .ok_or_else(|| OkrError::not_found("kpi", id))?;
        txn.commit().await?;
        Kpi::try_from(saved)
    }

    /// Explains a guarded write that matched no row.
    async fn stale_write(&self, id: i32, guard: Option<(ApprovalAction, KpiStatus)>) -> OkrError {
        let current = match KpiRepository::find(self.db.as_ref(), id).await {
            Ok(Some(model)) => model,
            Ok(None) => return OkrError::not_found("kpi", id),
            Err(e) => return e.into(),
        };
        match guard {
            Some((action, _)) => {
                warn!(
                    "Kpi {} changed to {} before {} could be applied",
                    id, current.status, action.as_str()
                );
                OkrError::InvalidTransition {
                    action: action.as_str(),
                    from: current.status,
                }
            }
            None => OkrError::not_found("kpi", id),
        }
    }

    pub async fn create(&self, actor: &Actor, req: CreateKpiRequest) -> OkrResult<Kpi> {
        validate_title(&req.title)?;
        validate_year(req.year)?;
        let progress = match req.progress_percentage {
            Some(p) => {
                validate_percentage("progress_percentage", p)?;
                Some(p)
            }
            None => derive_progress(req.target_value.as_deref(), req.current_value.as_deref()),
        };

        let txn = self.db.begin().await?;
        let model = KpiRepository::insert(&txn, &req, actor.user_id, progress).await?;
        HistoryRepository::record(
            &txn,
            model.id,
            actor.user_id,
            "created",
            None,
            Some(KpiStatus::Draft.as_str().to_string()),
        )
        .await?;
        txn.commit().await?;
        info!("Created kpi {} for user {}", model.id, actor.user_id);
        Kpi::try_from(model)
    }

    pub async fn get(&self, actor: &Actor, id: i32) -> OkrResult<Kpi> {
        let model = self.require(id).await?;
        authorize_view(actor, &model)?;
        Kpi::try_from(model)
    }

    pub async fn list(&self, actor: &Actor, mut filter: KpiFilter) -> OkrResult<KpiPage> {
        if !actor.is_reviewer() {
            filter.owner_id = Some(actor.user_id);
        }
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(100).min(MAX_PAGE);
        let (models, total) = KpiRepository::list(self.db.as_ref(), &filter).await?;
        Ok(KpiPage {
            items: kpis_from_models(models)?,
            total,
            offset,
            limit,
        })
    }

    /// Content edit. Only the owner, only in draft or rejected; a rejected
    /// kpi goes back to draft.
    pub async fn update(&self, actor: &Actor, id: i32, req: UpdateKpiRequest) -> OkrResult<Kpi> {
        let model = self.require(id).await?;
        let from = Self::status_of(&model)?;
        let to = approval::check(actor, model.owner_id, from, ApprovalAction::Edit)?;

        let mut columns: Vec<(KpiColumn, Value)> = vec![(KpiColumn::Status, to.as_str().into())];
        if let Some(title) = req.title {
            validate_title(&title)?;
            columns.push((KpiColumn::Title, title.trim().to_string().into()));
        }
        if let Some(year) = req.year {
            validate_year(year)?;
            columns.push((KpiColumn::Year, year.into()));
        }
        if let Some(description) = req.description {
            columns.push((KpiColumn::Description, Some(description).into()));
        }
        if let Some(category) = req.category {
            columns.push((KpiColumn::Category, Some(category).into()));
        }
        if let Some(quarter) = req.quarter {
            columns.push((KpiColumn::Quarter, quarter.as_str().into()));
        }

        let values_changed = req.target_value.is_some() || req.current_value.is_some();
        let target = req.target_value.or(model.target_value);
        let current = req.current_value.or(model.current_value);
        if values_changed {
            columns.push((KpiColumn::TargetValue, target.clone().into()));
            columns.push((KpiColumn::CurrentValue, current.clone().into()));
        }

        let progress = match req.progress_percentage {
            Some(p) => {
                validate_percentage("progress_percentage", p)?;
                Some(p)
            }
            None if values_changed => derive_progress(target.as_deref(), current.as_deref())
                .or(model.progress_percentage),
            None => model.progress_percentage,
        };
        let progress_changed = progress != model.progress_percentage;
        if progress_changed {
            columns.push((KpiColumn::ProgressPercentage, progress.into()));
        }

        let change = KpiChange {
            columns,
            action: "updated",
            old_value: Some(from.as_str().to_string()),
            new_value: Some(to.as_str().to_string()),
        };
        let kpi = self
            .apply(actor, id, Some((ApprovalAction::Edit, from)), change)
            .await?;
        info!("Updated kpi {} ({} -> {})", id, from, to);

        if progress_changed {
            self.progress.recalculate_for_kpi(id).await?;
        }
        Ok(kpi)
    }

    /// The row is only removed while it is still a draft.
    pub async fn delete(&self, actor: &Actor, id: i32) -> OkrResult<()> {
        let guard = self.progress.lock().await;
        let model = self.require(id).await?;
        let from = Self::status_of(&model)?;
        approval::check(actor, model.owner_id, from, ApprovalAction::Delete)?;

        let links = LinkRepository::list_for_kpi(self.db.as_ref(), id).await?;

        let txn = self.db.begin().await?;
        LinkRepository::delete_for_kpi(&txn, id).await?;
        CommentRepository::delete_for_kpi(&txn, id).await?;
        if KpiRepository::delete_in_status(&txn, id, from).await? == 0 {
            txn.rollback().await?;
            return Err(self
                .stale_write(id, Some((ApprovalAction::Delete, from)))
                .await);
        }
        HistoryRepository::record(
            &txn,
            id,
            actor.user_id,
            "deleted",
            Some(from.as_str().to_string()),
            None,
        )
        .await?;
        txn.commit().await?;
        info!("Deleted kpi {} by user {}", id, actor.user_id);

        for link in links {
            self.progress
                .recalculate_chain_locked(&guard, link.objective_id)
                .await?;
        }
        Ok(())
    }

    /// Owner-only, allowed in every status. Without an explicit percentage,
    /// progress is derived from target and current value when both are numeric.
    /// Only the value columns are written, so a review running at the same
    /// time keeps its status change and this keeps the progress.
    pub async fn update_progress(
        &self,
        actor: &Actor,
        id: i32,
        req: ProgressUpdateRequest,
    ) -> OkrResult<Kpi> {
        let model = self.require(id).await?;
        if !actor.owns(model.owner_id) {
            return Err(OkrError::forbidden(format!(
                "only the owner may update progress of kpi {}",
                id
            )));
        }
        if req.current_value.is_none() && req.progress_percentage.is_none() {
            return Err(OkrError::validation(
                "current_value or progress_percentage is required",
            ));
        }

        let old = describe_progress(model.current_value.as_deref(), model.progress_percentage);
        let current = req.current_value.or(model.current_value);
        let progress = match req.progress_percentage {
            Some(p) => {
                validate_percentage("progress_percentage", p)?;
                Some(p)
            }
            None => derive_progress(model.target_value.as_deref(), current.as_deref())
                .or(model.progress_percentage),
        };
        let new = describe_progress(current.as_deref(), progress);

        let change = KpiChange {
            columns: vec![
                (KpiColumn::CurrentValue, current.into()),
                (KpiColumn::ProgressPercentage, progress.into()),
            ],
            action: "progress",
            old_value: old,
            new_value: new,
        };
        let kpi = self.apply(actor, id, None, change).await?;
        info!(
            "Kpi {} progress set to {:?} by user {}",
            id, kpi.progress_percentage, actor.user_id
        );
        self.progress.recalculate_for_kpi(id).await?;
        Ok(kpi)
    }

    pub async fn submit(&self, actor: &Actor, id: i32) -> OkrResult<Kpi> {
        let model = self.require(id).await?;
        let from = Self::status_of(&model)?;
        let to = approval::check(actor, model.owner_id, from, ApprovalAction::Submit)?;

        let change = KpiChange {
            columns: vec![
                (KpiColumn::Status, to.as_str().into()),
                (KpiColumn::SubmittedAt, Some(Utc::now().timestamp()).into()),
            ],
            action: "submitted",
            old_value: Some(from.as_str().to_string()),
            new_value: Some(to.as_str().to_string()),
        };
        let kpi = self
            .apply(actor, id, Some((ApprovalAction::Submit, from)), change)
            .await?;
        info!("Kpi {} submitted by user {}", id, actor.user_id);
        Ok(kpi)
    }

    /// Sets the review columns; the write only lands while the kpi is
    /// still in `from`.
    async fn review(
        &self,
        actor: &Actor,
        id: i32,
        action: ApprovalAction,
        note: Option<String>,
    ) -> OkrResult<Kpi> {
        let model = self.require(id).await?;
        let from = Self::status_of(&model)?;
        let to = approval::check(actor, model.owner_id, from, action)?;

        let history_note = match action {
            ApprovalAction::Reject => kpi_note(to, note.as_deref()),
            _ => kpi_note(to, None),
        };
        let change = KpiChange {
            columns: vec![
                (KpiColumn::Status, to.as_str().into()),
                (KpiColumn::ReviewedAt, Some(Utc::now().timestamp()).into()),
                (KpiColumn::ReviewedBy, Some(actor.user_id).into()),
                (KpiColumn::ReviewNote, note.into()),
            ],
            action: match action {
                ApprovalAction::Reject => "rejected",
                _ => "approved",
            },
            old_value: Some(from.as_str().to_string()),
            new_value: history_note,
        };
        self.apply(actor, id, Some((action, from)), change).await
    }

    pub async fn approve(&self, actor: &Actor, id: i32, comment: Option<String>) -> OkrResult<Kpi> {
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let kpi = self
            .review(actor, id, ApprovalAction::Approve, comment)
            .await?;
        info!("Kpi {} approved by user {}", id, actor.user_id);

        self.notifications
            .notify(
                kpi.owner_id,
                NotificationKind::KpiApproved,
                format!("KPI approved: {}", kpi.title),
                match &kpi.review_note {
                    Some(note) => format!("Your KPI \"{}\" was approved: {}", kpi.title, note),
                    None => format!("Your KPI \"{}\" was approved.", kpi.title),
                },
                Some(kpi.id),
            )
            .await;
        self.recalculate_after_review(id).await;
        Ok(kpi)
    }

    /// The reason is checked before the kpi is even loaded.
    pub async fn reject(&self, actor: &Actor, id: i32, reason: Option<String>) -> OkrResult<Kpi> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| OkrError::validation("rejection reason is required"))?;

        let kpi = self
            .review(actor, id, ApprovalAction::Reject, Some(reason.clone()))
            .await?;
        info!("Kpi {} rejected by user {}", id, actor.user_id);

        self.notifications
            .notify(
                kpi.owner_id,
                NotificationKind::KpiRejected,
                format!("KPI rejected: {}", kpi.title),
                format!("Your KPI \"{}\" was rejected: {}", kpi.title, reason),
                Some(kpi.id),
            )
            .await;
        self.recalculate_after_review(id).await;
        Ok(kpi)
    }

    async fn recalculate_after_review(&self, kpi_id: i32) {
        if !self.recalc_on_review {
            return;
        }
        if let Err(e) = self.progress.recalculate_for_kpi(kpi_id).await {
            warn!("Recalculation after review of kpi {} failed: {}", kpi_id, e);
        }
    }

    /// Review queue, oldest submission first.
    pub async fn pending(&self, actor: &Actor, offset: u64, limit: u64) -> OkrResult<KpiPage> {
        if !actor.is_reviewer() {
            return Err(OkrError::forbidden("only reviewers see the approval queue"));
        }
        let limit = limit.min(MAX_PAGE);
        let (models, total) = KpiRepository::pending(self.db.as_ref(), offset, limit).await?;
        Ok(KpiPage {
            items: kpis_from_models(models)?,
            total,
            offset,
            limit,
        })
    }

    /// Employees see figures for their own kpis; reviewers for everyone's.
    pub async fn statistics(&self, actor: &Actor, year: Option<i32>) -> OkrResult<KpiStatistics> {
        let owner = (!actor.is_reviewer()).then_some(actor.user_id);
        let mut stats = KpiRepository::statistics(self.db.as_ref(), owner, year).await?;
        stats.my_kpis = match owner {
            Some(_) => stats.total,
            None => KpiRepository::count_owned(self.db.as_ref(), actor.user_id, year).await?,
        };
        Ok(stats)
    }

    pub async fn objectives_for_kpi(&self, actor: &Actor, id: i32) -> OkrResult<Vec<LinkView>> {
        let model = self.require(id).await?;
        authorize_view(actor, &model)?;
        let links = LinkRepository::list_for_kpi(self.db.as_ref(), id).await?;
        Ok(links.into_iter().map(LinkView::from).collect())
    }

    pub async fn history(&self, actor: &Actor, id: i32) -> OkrResult<Vec<HistoryEntry>> {
        let model = self.require(id).await?;
        authorize_view(actor, &model)?;
        Ok(HistoryRepository::list_for_kpi(self.db.as_ref(), id).await?)
    }
}

fn kpi_note(status: KpiStatus, note: Option<&str>) -> Option<String> {
    Some(match note {
        Some(n) => format!("{}: {}", status, n),
        None => status.to_string(),
    })
}
