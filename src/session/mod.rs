pub mod actor;
pub mod extract;

pub use actor::{Actor, Role};
