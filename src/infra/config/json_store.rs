use crate::core::config::{ConfigError, ConfigStore, SyncConfig};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Sync configuration kept in a pretty-printed JSON file.
pub struct JsonConfigStore {
    path: PathBuf,
    cache: RwLock<Option<SyncConfig>>,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    async fn persist(&self, config: &SyncConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<SyncConfig, ConfigError> {
        if let Some(config) = self.cache.read().await.as_ref() {
            return Ok(config.clone());
        }

        let config = if self.path.exists() {
            let text = tokio::fs::read_to_string(&self.path).await?;
            serde_json::from_str(&text)?
        } else {
            SyncConfig::default()
        };

        *self.cache.write().await = Some(config.clone());
        Ok(config)
    }

    async fn save(&self, config: &SyncConfig) -> Result<(), ConfigError> {
        self.persist(config).await?;
        *self.cache.write().await = Some(config.clone());
        Ok(())
    }
}
