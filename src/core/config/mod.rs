pub mod config_models;
pub mod config_service;

pub use config_models::{ConfigError, ConfigStore, ConfigUpdate, SyncConfig};
pub use config_service::ConfigService;
