pub mod analytics;
pub mod goal;
pub mod weekly_log;
