pub mod comment_repo;
pub mod history_repo;
pub mod kpi_repo;
pub mod link_repo;
pub mod notification_repo;
pub mod objective_repo;

pub use comment_repo::CommentRepository;
pub use history_repo::HistoryRepository;
pub use kpi_repo::KpiRepository;
pub use link_repo::LinkRepository;
pub use notification_repo::NotificationRepository;
pub use objective_repo::ObjectiveRepository;
