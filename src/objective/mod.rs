pub mod model;
pub mod service;
pub mod tree;

pub use model::{Level, Objective, ObjectiveStatus, Period};
pub use service::ObjectiveService;
