pub mod aggregator;
pub mod service;

pub use aggregator::{AggregationPolicy, ProgressBreakdown, ProgressMethod};
pub use service::ProgressService;
