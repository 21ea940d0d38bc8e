//! Authentication for filebox.
//!
//! - [`CredentialStore`]: password digests and quotas, persisted as JSON
//! - [`TokenService`]: stateless HMAC-signed session tokens
//! - password hashing (Argon2id, legacy SHA-256 verification)

pub mod credentials;
pub mod password;
pub mod token;

pub use credentials::{CredentialStore, UserRecord};
pub use password::{hash_password, verify_password, PasswordError};
pub use token::{generate_secret, TokenClaims, TokenError, TokenService, DEFAULT_TOKEN_TTL_SECS};
