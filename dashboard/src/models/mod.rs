pub mod deployment;
pub mod log_line;
