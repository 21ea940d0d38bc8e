//! Credential store.
//!
//! Holds each user's password digest and storage quota. The store is the
//! only owner of user records; it is persisted as a single JSON document:
//!
//! ```text
//! { "users": { "admin": { "password": "$argon2id$...", "quota": 104857600 } } }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::document;
use crate::{FileboxError, Result};

use super::password::{hash_password, is_legacy_digest, verify_password, verify_unknown_user};

/// A stored user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Password digest (Argon2 PHC string or legacy SHA-256 hex).
    pub password: String,
    /// Storage ceiling in bytes.
    pub quota: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersDocument {
    users: HashMap<String, UserRecord>,
}

/// Source of truth for authentication and quota checks.
pub struct CredentialStore {
    path: PathBuf,
    users: RwLock<HashMap<String, UserRecord>>,
}

impl CredentialStore {
    /// Open the store at `path`, seeding the default account on first boot.
    ///
    /// A document that exists but cannot be parsed is an error.
    pub fn open(path: impl Into<PathBuf>, auth: &AuthConfig) -> Result<Self> {
        let path = path.into();

        match document::read::<UsersDocument>(&path)? {
            Some(doc) => {
                tracing::info!(users = doc.users.len(), path = %path.display(), "Loaded credentials");
                Ok(Self {
                    path,
                    users: RwLock::new(doc.users),
                })
            }
            None => {
                let store = Self {
                    path,
                    users: RwLock::new(HashMap::new()),
                };
                store.put_user(
                    &auth.default_username,
                    &auth.default_password,
                    auth.default_quota_bytes,
                )?;
                tracing::info!(
                    username = %auth.default_username,
                    "Seeded default account"
                );
                Ok(store)
            }
        }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check a username/password pair.
    ///
    /// Unknown user and wrong password both yield `InvalidCredentials`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        let digest = self.users.read().get(username).map(|u| u.password.clone());

        let Some(digest) = digest else {
            let _ = verify_unknown_user(password);
            return Err(FileboxError::InvalidCredentials);
        };

        // Legacy digests verify instantly; pad them to Argon2 cost as well
        if is_legacy_digest(&digest) {
            let _ = verify_unknown_user(password);
        }

        verify_password(password, &digest).map_err(|e| {
            tracing::debug!(username, error = %e, "Password verification failed");
            FileboxError::InvalidCredentials
        })
    }

    /// Storage ceiling for a user, if the user exists.
    pub fn quota_for(&self, username: &str) -> Option<u64> {
        self.users.read().get(username).map(|u| u.quota)
    }

    /// Whether a user exists.
    pub fn contains(&self, username: &str) -> bool {
        self.users.read().contains_key(username)
    }

    /// Create or replace a user and persist the store.
    ///
    /// This is the administrative path; it has no HTTP surface.
    pub fn put_user(&self, username: &str, password: &str, quota: u64) -> Result<()> {
        if username.is_empty() {
            return Err(FileboxError::BadRequest("username must not be empty".into()));
        }
        let digest =
            hash_password(password).map_err(|e| FileboxError::BadRequest(e.to_string()))?;

        let mut users = self.users.write();
        let previous = users.insert(
            username.to_string(),
            UserRecord {
                password: digest,
                quota,
            },
        );

        if let Err(e) = self.persist(&users) {
            match previous {
                Some(record) => users.insert(username.to_string(), record),
                None => users.remove(username),
            };
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self, users: &HashMap<String, UserRecord>) -> Result<()> {
        #[derive(Serialize)]
        struct UsersRef<'a> {
            users: &'a HashMap<String, UserRecord>,
        }
        document::write(&self.path, &UsersRef { users })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            default_quota_bytes: 1000,
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_open_seeds_default_account() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");

        let store = CredentialStore::open(&path, &auth_config()).unwrap();

        assert!(path.exists());
        assert!(store.contains("admin"));
        assert_eq!(store.quota_for("admin"), Some(1000));
        assert!(store.authenticate("admin", "admin").is_ok());
    }

    #[test]
    fn test_reopen_keeps_users() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");

        {
            let store = CredentialStore::open(&path, &auth_config()).unwrap();
            store.put_user("alice", "wonderland", 42).unwrap();
        }

        let store = CredentialStore::open(&path, &auth_config()).unwrap();
        assert_eq!(store.quota_for("alice"), Some(42));
        assert!(store.authenticate("alice", "wonderland").is_ok());
    }

    #[test]
    fn test_authenticate_failures_are_indistinguishable() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(dir.path().join("users.json"), &auth_config()).unwrap();

        let unknown = store.authenticate("nobody", "admin").unwrap_err();
        let wrong = store.authenticate("admin", "wrong").unwrap_err();

        assert!(matches!(unknown, FileboxError::InvalidCredentials));
        assert!(matches!(wrong, FileboxError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn test_unknown_user_costs_a_full_verification() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(dir.path().join("users.json"), &auth_config()).unwrap();
        // Build the decoy digest up front
        let _ = store.authenticate("nobody", "x");

        let time = |username: &str| {
            let start = std::time::Instant::now();
            for _ in 0..2 {
                let _ = store.authenticate(username, "x");
            }
            start.elapsed()
        };
        let unknown = time("nobody");
        let wrong = time("admin");

        assert!(
            unknown * 4 >= wrong,
            "unknown user took {unknown:?}, wrong password took {wrong:?}"
        );
    }

    #[test]
    fn test_legacy_document_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"{"users":{"admin":{"password":"8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918","quota":104857600}}}"#,
        )
        .unwrap();

        let store = CredentialStore::open(&path, &auth_config()).unwrap();
        assert!(store.authenticate("admin", "admin").is_ok());
        assert_eq!(store.quota_for("admin"), Some(104857600));
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "garbage").unwrap();

        assert!(CredentialStore::open(&path, &auth_config()).is_err());
    }

    #[test]
    fn test_quota_for_unknown_user() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(dir.path().join("users.json"), &auth_config()).unwrap();
        assert_eq!(store.quota_for("ghost"), None);
    }
}
