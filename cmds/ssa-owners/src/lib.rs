pub mod commands;
pub mod config;
pub mod input;
pub mod telemetry;
