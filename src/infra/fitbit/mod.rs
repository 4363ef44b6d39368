// Fitbit infra layer.
// - `fitbit_client.rs` talks to the Fitbit Web API.
// - `oauth.rs` runs the OAuth2 code flow and keeps the access token fresh.
// - `token_store.rs` persists the token pair to disk.

pub mod fitbit_client;
pub mod oauth;
pub mod token_store;

pub use fitbit_client::FitbitApiClient;
pub use oauth::{FitbitOAuth, OAuthEndpoints, DEFAULT_SCOPES};
pub use token_store::JsonTokenStore;
