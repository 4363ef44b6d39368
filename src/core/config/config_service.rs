use super::config_models::{ConfigError, ConfigStore, ConfigUpdate, SyncConfig};
use crate::core::fitbit::DEFAULT_LOGGABLES;

pub struct ConfigService<S: ConfigStore> {
    store: S,
}

impl<S: ConfigStore> ConfigService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<SyncConfig, ConfigError> {
        let mut config = self.store.load().await?;
        config.dedup_metrics();
        Ok(config)
    }

    /// Merges `update` into the stored config, validates and saves it.
    pub async fn configure(&self, update: ConfigUpdate) -> Result<SyncConfig, ConfigError> {
        let mut config = self.load().await?;

        if let Some(id) = update.client_id {
            config.client_id = id.trim().to_string();
        }
        if let Some(secret) = update.client_secret {
            config.client_secret = secret.trim().to_string();
        }
        if let Some(metrics) = update.metrics {
            config.metrics = metrics
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            config.dedup_metrics();
        }
        if let Some(period) = update.period {
            config.period = period;
        }

        validate_metrics(&config.metrics)?;
        self.store.save(&config).await?;
        tracing::info!(
            "Saved configuration: {} metrics, period {}",
            config.metrics.len(),
            config.period
        );
        Ok(config)
    }
}

fn validate_metrics(metrics: &[String]) -> Result<(), ConfigError> {
    if metrics.is_empty() {
        return Err(ConfigError::NoMetrics);
    }

    for metric in metrics {
        let well_formed = metric.contains('/')
            && !metric.starts_with('/')
            && !metric.ends_with('/')
            && !metric.chars().any(|c| c.is_whitespace());
        if !well_formed {
            return Err(ConfigError::InvalidMetric(metric.clone()));
        }
        if !DEFAULT_LOGGABLES.contains(&metric.as_str()) {
            tracing::warn!("'{}' is not one of the default loggables", metric);
        }
    }
    Ok(())
}
