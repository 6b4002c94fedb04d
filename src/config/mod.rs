//! Configuration module for the proposal board.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Default upper bound on concurrent per-proposal vote queries.
pub const DEFAULT_VOTE_FETCH_CONCURRENCY: usize = 8;

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API access (disabled when unset)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Maximum number of vote queries in flight during one refresh
    pub vote_fetch_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("BOARD_API_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("BOARD_DB_PATH")
            .unwrap_or_else(|_| "./data/board.sqlite".to_string())
            .into();

        let bind_addr_raw =
            env::var("BOARD_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "BOARD_BIND_ADDR",
            value: bind_addr_raw.clone(),
        })?;

        let log_level = env::var("BOARD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("BOARD_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    var: "BOARD_LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let vote_fetch_concurrency = match env::var("BOARD_VOTE_FETCH_CONCURRENCY") {
            Ok(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "BOARD_VOTE_FETCH_CONCURRENCY",
                        value: raw,
                    })
                }
            },
            Err(_) => DEFAULT_VOTE_FETCH_CONCURRENCY,
        };

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            log_format,
            vote_fetch_concurrency,
        })
    }
}
