/// Configuration loading from TOML file layered with environment variables
use std::path::Path;

use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, Environment, File, FileFormat};

use crate::error::{Result, StatsError};
use crate::types::Config;

const ENV_PREFIX: &str = "STOCKSTATS";

/// Load `path` (optional on disk), then apply `STOCKSTATS__*` and `PORT` overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let builder = ::config::Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("port", std::env::var("PORT").ok())
        .map_err(|e| StatsError::ConfigError(format!("Failed to apply PORT override: {}", e)))?;

    build(builder)
}

/// Parse configuration from TOML text without consulting the environment
pub fn parse_config(content: &str) -> Result<Config> {
    let builder = ::config::Config::builder().add_source(File::from_str(content, FileFormat::Toml));
    build(builder)
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<Config> {
    let config: Config = builder
        .build()
        .map_err(|e| StatsError::ConfigError(format!("Failed to read config: {}", e)))?
        .try_deserialize()
        .map_err(|e| StatsError::ConfigError(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    if !config.api_base_url.starts_with("http://") && !config.api_base_url.starts_with("https://") {
        return Err(StatsError::ConfigError(format!(
            "api_base_url must be an http(s) URL: {}",
            config.api_base_url
        )));
    }

    if config.credentials.client_id.is_empty() || config.credentials.client_secret.is_empty() {
        return Err(StatsError::ConfigError(
            "credentials.client_id and credentials.client_secret are required".to_string(),
        ));
    }

    if config.cache_ttl_sec == 0 {
        return Err(StatsError::ConfigError("cache_ttl_sec must be > 0".to_string()));
    }

    if config.cache_sweep_interval_sec == 0 {
        return Err(StatsError::ConfigError("cache_sweep_interval_sec must be > 0".to_string()));
    }

    if config.request_timeout_sec == 0 {
        return Err(StatsError::ConfigError("request_timeout_sec must be > 0".to_string()));
    }

    if config.auth_retry_backoff_sec == 0 {
        return Err(StatsError::ConfigError("auth_retry_backoff_sec must be > 0".to_string()));
    }

    Ok(())
}
