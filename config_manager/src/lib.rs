use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// General system settings
    pub system: SystemSettings,

    /// Remote history API configuration
    pub history_api: HistoryApiConfig,

    /// Account the tracker syncs; empty id means "no authenticated account"
    pub account: AccountConfig,

    /// Redis snapshot cache configuration
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Enable debug mode
    pub debug_mode: bool,

    /// Foreground refresh interval in milliseconds
    pub refresh_interval_ms: u64,

    /// Maximum backfill pages fetched per run (0 = until exhausted)
    pub backfill_max_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryApiConfig {
    /// History API base URL
    pub api_base_url: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Logical account id; leave empty to run without an account
    pub id: String,

    /// Wallet addresses owned by the account
    pub wallets: Vec<String>,

    /// Pre-signed verification message produced by the wallet signer
    pub proof_message: String,

    /// Address that signed the verification message
    pub proof_signer: String,

    /// Proof validity window in minutes, measured from process start
    pub proof_valid_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Enable history snapshot caching
    pub enabled: bool,

    /// Snapshot TTL in seconds
    pub snapshot_ttl_seconds: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            system: SystemSettings {
                debug_mode: false,
                refresh_interval_ms: 60_000,
                backfill_max_pages: 0,
            },
            history_api: HistoryApiConfig {
                api_base_url: "https://api.history.example/v1".to_string(),
                request_timeout_seconds: 30,
            },
            account: AccountConfig {
                id: String::new(), // Must be set in config file or environment
                wallets: Vec::new(),
                proof_message: String::new(),
                proof_signer: String::new(),
                proof_valid_minutes: 60,
            },
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                enabled: false,
                snapshot_ttl_seconds: 3_600,
            },
        }
    }
}

impl HistoryApiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "History API base URL is required".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl AccountConfig {
    /// An empty id means the tracker runs unauthenticated (every sync is a
    /// no-op); a configured account must carry wallets and a signed proof.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Ok(());
        }

        if self.wallets.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Configured account must list at least one wallet".to_string(),
            ));
        }

        if self.proof_message.is_empty() || self.proof_signer.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Configured account requires proof_message and proof_signer".to_string(),
            ));
        }

        if self.proof_valid_minutes <= 0 {
            return Err(ConfigurationError::InvalidValue(
                "proof_valid_minutes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        // Add config file if it exists
        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        // Add environment variables with prefix
        config_builder = config_builder.add_source(
            Environment::with_prefix("HISTORY")
                .try_parsing(true)
                .separator("__")
                .list_separator(","),
        );

        let config = config_builder.build()?;
        let system_config: SystemConfig = config.try_deserialize()?;

        system_config.validate()?;
        Ok(system_config)
    }

    pub fn validate(&self) -> Result<()> {
        self.history_api.validate()?;
        self.account.validate()?;

        if self.redis.enabled && self.redis.url.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Redis URL is required when snapshot caching is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = SystemConfig::default();
        config.history_api.request_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn configured_account_requires_wallets_and_proof() {
        let mut config = SystemConfig::default();
        config.account.id = "acct-1".to_string();
        assert!(config.validate().is_err());

        config.account.wallets = vec!["0xwallet".to_string()];
        config.account.proof_message = "signed".to_string();
        config.account.proof_signer = "0xwallet".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SystemConfig::load_from_path("does_not_exist.toml").unwrap();
        assert_eq!(config.history_api.request_timeout_seconds, 30);
        assert!(config.account.id.is_empty());
    }
}
