pub mod kpi;
pub mod kpi_comment;
pub mod kpi_history;
pub mod notification;
pub mod objective;
pub mod objective_kpi_link;
