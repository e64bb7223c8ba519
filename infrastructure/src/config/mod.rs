//! Configuration loading: TOML sections and the figment merge pipeline.

pub mod file_config;
pub mod loader;

pub use file_config::{
    ConfigError, FileChatConfig, FileConfig, FileProviderConfig, FileQuotaConfig,
    FileStorageConfig,
};
pub use loader::ConfigLoader;
