use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::fitbit::{FitbitError, OAuthTokens, TokenStore};

/// Keeps the OAuth token pair in a JSON file next to the other runtime data.
pub struct JsonTokenStore {
    path: PathBuf,
}

impl JsonTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TokenStore for JsonTokenStore {
    async fn load(&self) -> Result<Option<OAuthTokens>, FitbitError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| FitbitError::Store(e.to_string()))?;

        let tokens: OAuthTokens =
            serde_json::from_str(&text).map_err(|e| FitbitError::Store(e.to_string()))?;
        Ok(Some(tokens))
    }

    async fn save(&self, tokens: &OAuthTokens) -> Result<(), FitbitError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FitbitError::Store(e.to_string()))?;
        }

        let text =
            serde_json::to_string_pretty(tokens).map_err(|e| FitbitError::Store(e.to_string()))?;
        fs::write(&self.path, text)
            .await
            .map_err(|e| FitbitError::Store(e.to_string()))
    }
}
