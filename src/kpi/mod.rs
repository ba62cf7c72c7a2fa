pub mod approval;
pub mod comments;
pub mod model;
pub mod service;

pub use model::{Kpi, KpiStatus};
pub use service::KpiService;
