//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > defaults.
//! The binary applies command-line overrides on top.

mod builder;
mod env;
mod file;

pub use builder::{GatewayConfig, GatewayConfigBuilder, ServerConfig, TelemetryConfig};

use crate::Result;

/// Load configuration with precedence: env > file > defaults
pub fn load_config() -> Result<GatewayConfigBuilder> {
    let mut builder = GatewayConfigBuilder::new();

    if let Some(path) = file::find_config_file() {
        tracing::info!(path = %path.display(), "Loading configuration file");
        builder = file::load_from_file(&path, builder)?;
    }

    env::load_from_env(builder)
}

/// Load configuration from a specific file path
pub fn load_config_from_path(path: &std::path::Path) -> Result<GatewayConfigBuilder> {
    let builder = file::load_from_file(path, GatewayConfigBuilder::new())?;
    env::load_from_env(builder)
}
