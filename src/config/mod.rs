//! Configuration module for the Venture backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;
use crate::models::CompletionMemoryPolicy;

/// Upper bound for `VENTURE_ACTIVE_WINDOW_DAYS` (about a century).
pub const MAX_ACTIVE_WINDOW_DAYS: i64 = 36_500;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// How goal edits treat completion photos/journal on incomplete goals
    pub completion_memory: CompletionMemoryPolicy,
    /// Window, in days, for the "active users" admin statistic
    pub active_window_days: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_psk = lookup("VENTURE_API_PSK").filter(|v| !v.is_empty());

        let db_path = lookup("VENTURE_DB_PATH")
            .unwrap_or_else(|| "./data/venture.sqlite".to_string())
            .into();

        let bind_raw =
            lookup("VENTURE_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_addr = bind_raw.parse().map_err(|_| {
            AppError::Internal(format!("Invalid VENTURE_BIND_ADDR format: {}", bind_raw))
        })?;

        let log_level = lookup("VENTURE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let completion_memory = match lookup("VENTURE_COMPLETION_MEMORY") {
            Some(raw) => CompletionMemoryPolicy::from_str(&raw).ok_or_else(|| {
                AppError::Internal(format!(
                    "Invalid VENTURE_COMPLETION_MEMORY value: {} (expected preserve or clear)",
                    raw
                ))
            })?,
            None => CompletionMemoryPolicy::Preserve,
        };

        let active_window_days = match lookup("VENTURE_ACTIVE_WINDOW_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|d| (1..=MAX_ACTIVE_WINDOW_DAYS).contains(d))
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "Invalid VENTURE_ACTIVE_WINDOW_DAYS value: {} (expected 1 to {})",
                        raw, MAX_ACTIVE_WINDOW_DAYS
                    ))
                })?,
            None => 30,
        };

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            completion_memory,
            active_window_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/venture.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.completion_memory, CompletionMemoryPolicy::Preserve);
        assert_eq!(config.active_window_days, 30);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("VENTURE_API_PSK", "secret"),
            ("VENTURE_BIND_ADDR", "0.0.0.0:9000"),
            ("VENTURE_COMPLETION_MEMORY", "clear"),
            ("VENTURE_ACTIVE_WINDOW_DAYS", "7"),
        ]))
        .unwrap();

        assert_eq!(config.api_psk.as_deref(), Some("secret"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(
            config.completion_memory,
            CompletionMemoryPolicy::ClearWhenIncomplete
        );
        assert_eq!(config.active_window_days, 7);
    }

    #[test]
    fn test_empty_psk_disables_auth() {
        let config = Config::from_lookup(lookup_from(&[("VENTURE_API_PSK", "")])).unwrap();
        assert!(config.api_psk.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("VENTURE_BIND_ADDR", "nope")])).is_err());
        assert!(
            Config::from_lookup(lookup_from(&[("VENTURE_COMPLETION_MEMORY", "maybe")])).is_err()
        );
        assert!(Config::from_lookup(lookup_from(&[("VENTURE_ACTIVE_WINDOW_DAYS", "0")])).is_err());
    }

    #[test]
    fn test_active_window_is_capped() {
        let config =
            Config::from_lookup(lookup_from(&[("VENTURE_ACTIVE_WINDOW_DAYS", "36500")])).unwrap();
        assert_eq!(config.active_window_days, MAX_ACTIVE_WINDOW_DAYS);

        assert!(
            Config::from_lookup(lookup_from(&[("VENTURE_ACTIVE_WINDOW_DAYS", "36501")])).is_err()
        );
        assert!(Config::from_lookup(lookup_from(&[(
            "VENTURE_ACTIVE_WINDOW_DAYS",
            "1000000000000"
        )]))
        .is_err());
    }
}
