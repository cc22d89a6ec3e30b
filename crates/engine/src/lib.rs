pub mod agent;
pub mod cli;
pub mod config;
pub mod exercise;
pub mod llm;
pub mod logging;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
