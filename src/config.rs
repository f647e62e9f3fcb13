use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::env;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub realtime: RealtimeConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    pub enabled: bool,
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON file backing the local key-value store
    pub path: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub lookahead_minutes: i64,
    pub poll_interval_seconds: u64,
    pub icon: String,
}

/// Identity the daemon acts as. Leaving `user_id` unset runs it signed out.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let environment = env::var("HUB_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            // e.g., HUB__DATABASE__URL=postgres://...
            .add_source(
                config::Environment::with_prefix("HUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(AppError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::Configuration(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        if self.storage.key_prefix.trim().is_empty() {
            return Err(AppError::Configuration(
                "Local storage key prefix cannot be empty".to_string(),
            ));
        }

        if !(1..=1440).contains(&self.notifications.lookahead_minutes) {
            return Err(AppError::Configuration(
                "Notification lookahead must be between 1 and 1440 minutes".to_string(),
            ));
        }

        if self.notifications.poll_interval_seconds == 0 {
            return Err(AppError::Configuration(
                "Notification poll interval must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = Config::load().expect("Failed to load config");
        assert!(config.validate().is_ok());

        config.notifications.lookahead_minutes = 0;
        assert!(config.validate().is_err());

        config.notifications.lookahead_minutes = 15;
        config.storage.key_prefix = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_notification_window() {
        let config = Config::load().expect("Failed to load config");
        assert_eq!(config.notifications.lookahead_minutes, 15);
        assert_eq!(config.notifications.poll_interval_seconds, 60);
    }
}
