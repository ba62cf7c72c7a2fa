use crate::config::AppConfig;
use crate::kpi::KpiService;
use crate::notify::{NotificationService, NotificationSink};
use crate::objective::ObjectiveService;
use crate::progress::{AggregationPolicy, ProgressService};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared by every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<DatabaseConnection>,
    pub progress: Arc<ProgressService>,
    pub objectives: ObjectiveService,
    pub kpis: KpiService,
    pub notifications: Arc<NotificationService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DatabaseConnection,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let db = Arc::new(db);
        let policy = AggregationPolicy {
            approved_only: config.progress_approved_only,
        };
        let progress = Arc::new(ProgressService::new(db.clone(), policy));
        let notifications = Arc::new(NotificationService::new(db.clone(), sink));
        let objectives = ObjectiveService::new(db.clone(), progress.clone());
        let kpis = KpiService::new(
            db.clone(),
            progress.clone(),
            notifications.clone(),
            config.recalc_on_review,
        );

        Self {
            config,
            db,
            progress,
            objectives,
            kpis,
            notifications,
        }
    }
}
