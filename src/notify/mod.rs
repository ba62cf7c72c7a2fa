pub mod service;
pub mod sink;

pub use service::{NotificationKind, NotificationService};
pub use sink::{LogSink, NotificationSink};
