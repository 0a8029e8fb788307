pub mod commands;
pub mod report;
