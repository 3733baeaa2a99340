pub mod config;
pub mod logging;
mod runner;

pub use config::{
    ConfigError, CrafthammerConfig, HostConfig, LoggingConfig, RequestsConfig, SimConfig,
};
pub use logging::init_logging;
pub use runner::{HostInput, HostRunner, RunnerError};
