// ABOUTME: Server configuration loaded from environment variables
// ABOUTME: Every knob has a default so a bare `agentdeck` start works out of the box

use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use agentdeck_config::constants;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid duration in {var}: {value}")]
    InvalidDuration { var: &'static str, value: String },
}

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub cors_origin: String,
    pub catalog_root: PathBuf,
    pub model_cache_ttl: Duration,
    pub run_idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var(constants::AGENTDECK_API_PORT)
            .unwrap_or_else(|_| "8001".to_string())
            .parse::<u16>()?;
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let cors_origin = env::var(constants::AGENTDECK_CORS_ORIGIN)
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let catalog_root = env::var(constants::AGENTDECK_CATALOG_ROOT)
            .unwrap_or_else(|_| "catalog".to_string())
            .into();

        let model_cache_ttl = secs_from_env(constants::AGENTDECK_MODEL_CACHE_TTL_SECS, 300)?;
        let run_idle_timeout = secs_from_env(constants::AGENTDECK_RUN_IDLE_TIMEOUT_SECS, 120)?;

        Ok(Config {
            port,
            cors_origin,
            catalog_root,
            model_cache_ttl,
            run_idle_timeout,
        })
    }
}

fn secs_from_env(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(Duration::from_secs(default)),
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidDuration { var, value }),
    }
}
