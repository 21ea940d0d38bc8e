//! API handlers and shared application state.

pub mod auth;
pub mod file;

pub use auth::*;
pub use file::*;

use std::sync::Arc;

use crate::auth::{generate_secret, CredentialStore, TokenService};
use crate::config::Config;
use crate::file::{BlobStorage, FileService, MetadataStore};
use crate::notify::ChangeNotifier;
use crate::Result;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Credential store (authentication and quotas).
    pub credentials: Arc<CredentialStore>,
    /// Session token issuer/verifier.
    pub tokens: Arc<TokenService>,
    /// File operations.
    pub files: Arc<FileService>,
    /// Change notifier for WebSocket observers.
    pub notifier: Arc<ChangeNotifier>,
    /// Whether the WebSocket endpoint requires `?token=`.
    pub require_ws_token: bool,
}

impl AppState {
    /// Create a new application state from its parts.
    pub fn new(
        credentials: Arc<CredentialStore>,
        tokens: Arc<TokenService>,
        files: Arc<FileService>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            files,
            notifier,
            require_ws_token: false,
        }
    }

    /// Require a session token on the WebSocket endpoint.
    pub fn with_ws_token_required(mut self, required: bool) -> Self {
        self.require_ws_token = required;
        self
    }

    /// Open the stores named in `config` and wire up the services.
    ///
    /// Storage is reconciled against metadata before the state is returned.
    pub async fn open(config: &Config) -> Result<Self> {
        let credentials = Arc::new(CredentialStore::open(
            config.storage.users_file(),
            &config.auth,
        )?);
        let metadata = Arc::new(MetadataStore::open(config.storage.files_file())?);
        let storage = BlobStorage::new(&config.storage.upload_dir)?;
        let notifier = Arc::new(ChangeNotifier::new(Arc::clone(&metadata)));

        let secret = if config.auth.token_secret.is_empty() {
            tracing::warn!(
                "No token secret configured; generated a random one. Sessions will not survive a restart."
            );
            generate_secret()
        } else {
            config.auth.token_secret.as_bytes().to_vec()
        };
        let tokens = Arc::new(TokenService::new(secret, config.auth.token_ttl_secs));

        let files = Arc::new(FileService::new(
            metadata,
            storage,
            Arc::clone(&credentials),
            Arc::clone(&notifier),
        ));
        files.reconcile().await?;

        Ok(Self::new(credentials, tokens, files, notifier)
            .with_ws_token_required(config.server.require_ws_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data").to_string_lossy().into_owned();
        config.storage.upload_dir = dir.path().join("uploads").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_open_creates_stores() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let state = AppState::open(&config).await.unwrap();

        assert!(dir.path().join("data/users.json").exists());
        assert!(dir.path().join("data/files.json").exists());
        assert!(dir.path().join("uploads").is_dir());
        assert!(state.credentials.contains("admin"));
        assert!(!state.require_ws_token);
    }

    #[tokio::test]
    async fn test_configured_secret_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.auth.token_secret = "fixed-secret".to_string();

        let token = AppState::open(&config).await.unwrap().tokens.issue("admin");
        let reopened = AppState::open(&config).await.unwrap();

        assert!(reopened.tokens.verify(&token).is_ok());
    }

    #[tokio::test]
    async fn test_generated_secret_differs_per_boot() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let token = AppState::open(&config).await.unwrap().tokens.issue("admin");
        let reopened = AppState::open(&config).await.unwrap();

        assert!(reopened.tokens.verify(&token).is_err());
    }
}
