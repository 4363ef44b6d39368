use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::fitbit::{Period, DEFAULT_LOGGABLES};

/// Everything one refresh run needs to know. Loaded once at the start of a run
/// and passed by reference; the run never changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Resource paths in column order. Duplicates are dropped on load.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub period: Period,
}

fn default_metrics() -> Vec<String> {
    DEFAULT_LOGGABLES.iter().map(|m| m.to_string()).collect()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            metrics: default_metrics(),
            period: Period::default(),
        }
    }
}

impl SyncConfig {
    /// Both OAuth client credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }

    /// Drops repeated metrics, keeping the first occurrence so columns keep their order.
    pub fn dedup_metrics(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.metrics.retain(|m| seen.insert(m.clone()));
    }

    /// Credentials from the environment take precedence over stored ones.
    pub fn with_credential_overrides(
        mut self,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        if let Some(id) = client_id.filter(|v| !v.trim().is_empty()) {
            self.client_id = id;
        }
        if let Some(secret) = client_secret.filter(|v| !v.trim().is_empty()) {
            self.client_secret = secret;
        }
        self
    }
}

/// Partial update applied by `configure`. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub metrics: Option<Vec<String>>,
    pub period: Option<Period>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid metric '{0}': expected a resource path such as activities/log/steps")]
    InvalidMetric(String),
    #[error("At least one metric must be configured")]
    NoMetrics,
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Returns the stored config, or the defaults when nothing was saved yet.
    async fn load(&self) -> Result<SyncConfig, ConfigError>;
    async fn save(&self, config: &SyncConfig) -> Result<(), ConfigError>;
}
