//! Configuration module for sonarscope
//!
//! This module handles:
//! - Project-level configuration (sonarscope.toml)
//! - User-level defaults (~/.config/sonarscope/config.toml)
//! - Status band thresholds
//! - Collection limits and worker count

mod project_config;
mod user_config;

pub use project_config::{
    CollectConfig, OutputConfig, ServerConfig, SonarConfig, CONFIG_FILE, MAX_WORKERS,
};
pub use user_config::{user_config_path, write_example_config, EXAMPLE_CONFIG};
