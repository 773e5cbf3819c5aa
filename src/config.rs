//! Application configuration from environment variables and the state store.
//!
//! Non-sensitive settings come from the environment; the spreadsheet id,
//! OAuth client config, and state-signing key come from the persistent
//! state store so that they survive restarts alongside the credential.

use crate::state::{keys, StateStore};
use rand::RngCore;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Google OAuth client settings, as found in a client_secret.json.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// client_secret.json wraps the client under a "web" or "installed" key.
#[derive(Deserialize)]
struct ClientSecretFile {
    web: Option<OAuthClient>,
    installed: Option<OAuthClient>,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment variables ---
    /// Server port
    pub port: u16,
    /// Public base URL of this service, used for the OAuth redirect URI and
    /// the Drive watch channel address.
    pub external_url: String,
    /// Directory for the file-backed state store
    pub state_dir: PathBuf,

    // --- From the state store ---
    /// Target spreadsheet id
    pub sheet_id: String,
    /// Google OAuth client
    pub oauth_client: OAuthClient,
    /// HMAC key for signing the OAuth state parameter
    pub secret_key: Vec<u8>,
}

impl Config {
    /// Read the environment portion of the config. The state-store portion
    /// is filled in by [`Config::load`].
    pub fn state_dir_from_env() -> PathBuf {
        dotenvy::dotenv().ok(); // Load .env file if present
        env::var("STATE_DIR").unwrap_or_else(|_| ".".to_string()).into()
    }

    /// Load configuration from the environment and the state store.
    ///
    /// Generates and persists the state-signing key on first run.
    pub fn load(store: &StateStore) -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let external_url = env::var("EXTERNAL_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        let sheet_id = store
            .get_text(keys::SHEET_ID)
            .map_err(|e| ConfigError::Store(e.to_string()))?
            .ok_or(ConfigError::Missing(keys::SHEET_ID))?;

        let client_secret_json = store
            .get(keys::CLIENT_SECRET)
            .map_err(|e| ConfigError::Store(e.to_string()))?
            .ok_or(ConfigError::Missing(keys::CLIENT_SECRET))?;
        let oauth_client = parse_client_secret(&client_secret_json)?;

        let secret_key = match store
            .get(keys::SECRET_KEY)
            .map_err(|e| ConfigError::Store(e.to_string()))?
        {
            Some(key) if !key.is_empty() => key,
            _ => {
                let mut key = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                store
                    .set(keys::SECRET_KEY, &key)
                    .map_err(|e| ConfigError::Store(e.to_string()))?;
                tracing::info!("Generated new state-signing key");
                key
            }
        };

        Ok(Self {
            port,
            external_url,
            state_dir: Self::state_dir_from_env(),
            sheet_id,
            oauth_client,
            secret_key,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            external_url: "http://localhost:8080".to_string(),
            state_dir: ".".into(),
            sheet_id: "test-sheet-id".to_string(),
            oauth_client: OAuthClient {
                client_id: "test_client_id".to_string(),
                client_secret: "test_client_secret".to_string(),
                auth_uri: default_auth_uri(),
                token_uri: default_token_uri(),
            },
            secret_key: b"test_state_key_32_bytes_minimum!".to_vec(),
        }
    }
}

/// Parse a client_secret.json blob ("web" preferred, "installed" accepted).
fn parse_client_secret(bytes: &[u8]) -> Result<OAuthClient, ConfigError> {
    let file: ClientSecretFile = serde_json::from_slice(bytes)
        .map_err(|e| ConfigError::Invalid(keys::CLIENT_SECRET, e.to_string()))?;
    file.web.or(file.installed).ok_or(ConfigError::Invalid(
        keys::CLIENT_SECRET,
        "expected a \"web\" or \"installed\" section".to_string(),
    ))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required state key: {0}")]
    Missing(&'static str),

    #[error("Invalid state key {0}: {1}")]
    Invalid(&'static str, String),

    #[error("State store error: {0}")]
    Store(String),
}
