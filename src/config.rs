use crate::engine::DEFAULT_LOOKAHEAD_MS;
use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub database_path: String,
    /// How far ahead of kick-off ordinary readers can see a match.
    pub visibility_lookahead_ms: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let bind_addr = env_map
            .get("BIND_ADDR")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BIND_ADDR".to_string(),
                    "must be an IP address".to_string(),
                )
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let visibility_lookahead_ms = match env_map.get("VISIBILITY_LOOKAHEAD_MS") {
            None => DEFAULT_LOOKAHEAD_MS,
            Some(raw) => match raw.parse::<i64>() {
                Ok(ms) if ms >= 0 => ms,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "VISIBILITY_LOOKAHEAD_MS".to_string(),
                        format!("must be a non-negative i64, got {}", raw),
                    ))
                }
            },
        };

        Ok(Config {
            port,
            bind_addr,
            database_path,
            visibility_lookahead_ms,
        })
    }
}
