//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly; validation happens after merging.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors detected when validating a merged configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("provider.stall_timeout_seconds must be greater than zero")]
    InvalidTimeout,
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Provider settings (`[provider]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    /// Exchange endpoint URL
    pub endpoint: String,
    /// Seconds of stream silence tolerated before the exchange fails
    pub stall_timeout_seconds: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8787/api/exchange".to_string(),
            stall_timeout_seconds: 30,
        }
    }
}

/// Quota settings (`[quota]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileQuotaConfig {
    /// Lifetime exchange allowance for guests
    pub guest_limit: u32,
    /// Daily exchange allowance for free-tier users
    pub free_daily_limit: u32,
}

impl Default for FileQuotaConfig {
    fn default() -> Self {
        Self {
            guest_limit: 3,
            free_daily_limit: 20,
        }
    }
}

/// Storage settings (`[storage]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// Data directory override. Defaults to the platform data dir.
    pub data_dir: Option<String>,
}

/// Chat defaults (`[chat]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChatConfig {
    /// Default counseling mode: "listening", "guidance" or "reflection"
    pub mode: String,
    /// Default tone level, 0 (gentle) to 100 (direct)
    pub tone: u8,
}

impl Default for FileChatConfig {
    fn default() -> Self {
        Self {
            mode: "listening".to_string(),
            tone: 50,
        }
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Exchange provider settings
    pub provider: FileProviderConfig,
    /// Quota limits
    pub quota: FileQuotaConfig,
    /// Storage settings
    pub storage: FileStorageConfig,
    /// Chat defaults
    pub chat: FileChatConfig,
}

impl FileConfig {
    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.stall_timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_config() {
        let toml_str = r#"
[provider]
endpoint = "https://api.example.com/exchange"
stall_timeout_seconds = 45

[quota]
guest_limit = 5
free_daily_limit = 50

[storage]
data_dir = "/tmp/haven"

[chat]
mode = "guidance"
tone = 70
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.endpoint, "https://api.example.com/exchange");
        assert_eq!(config.provider.stall_timeout_seconds, 45);
        assert_eq!(config.quota.guest_limit, 5);
        assert_eq!(config.quota.free_daily_limit, 50);
        assert_eq!(config.storage.data_dir.as_deref(), Some("/tmp/haven"));
        assert_eq!(config.chat.mode, "guidance");
        assert_eq!(config.chat.tone, 70);
    }

    #[test]
    fn deserialize_partial_config_keeps_defaults() {
        let toml_str = r#"
[quota]
guest_limit = 1
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.quota.guest_limit, 1);
        // Defaults should apply
        assert_eq!(config.quota.free_daily_limit, 20);
        assert_eq!(config.provider.stall_timeout_seconds, 30);
        assert_eq!(config.chat.mode, "listening");
    }

    #[test]
    fn default_config_is_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.endpoint, "http://localhost:8787/api/exchange");
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn zero_stall_timeout_is_rejected() {
        let config: FileConfig = toml::from_str("[provider]\nstall_timeout_seconds = 0")
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout)
        ));
    }
}
