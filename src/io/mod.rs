pub mod cases;
pub mod rate_table;
pub mod trajectory_log;
pub mod weather;
