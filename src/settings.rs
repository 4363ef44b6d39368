// Runtime settings read from the environment (a `.env` file is loaded first).
//
// Only paths and endpoints live here. What to sync (credentials, metrics,
// period) is the sync config saved by `configure`.

use std::path::PathBuf;

use crate::infra::fitbit::OAuthEndpoints;

pub const DEFAULT_API_BASE_URL: &str = "https://api.fitbit.com";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.fitbit.com/oauth2/authorize";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub sheet_db: PathBuf,
    pub sheet_name: String,
    pub config_path: PathBuf,
    pub token_path: PathBuf,
    pub api_base_url: String,
    pub authorize_url: String,
    pub redirect_uri: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; unset or blank keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = PathBuf::from(get("FITBIT_DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let in_data_dir = |key: &str, file: &str| {
            get(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(file))
        };

        let api_base_url = get("FITBIT_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            sheet_db: in_data_dir("FITBIT_SHEET_DB", "sheet.db"),
            config_path: in_data_dir("FITBIT_CONFIG_PATH", "config.json"),
            token_path: in_data_dir("FITBIT_TOKEN_PATH", "tokens.json"),
            sheet_name: get("FITBIT_SHEET_NAME").unwrap_or_else(|| "fitbit".to_string()),
            authorize_url: get("FITBIT_AUTHORIZE_URL")
                .unwrap_or_else(|| DEFAULT_AUTHORIZE_URL.to_string()),
            redirect_uri: get("FITBIT_REDIRECT_URI")
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            client_id: get("FITBIT_CLIENT_ID"),
            client_secret: get("FITBIT_CLIENT_SECRET"),
            api_base_url,
            data_dir,
        }
    }

    pub fn oauth_endpoints(&self) -> OAuthEndpoints {
        OAuthEndpoints {
            authorize_url: self.authorize_url.clone(),
            token_url: format!("{}/oauth2/token", self.api_base_url),
            redirect_uri: self.redirect_uri.clone(),
        }
    }
}
