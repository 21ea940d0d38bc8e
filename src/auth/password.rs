//! Password digests for the credential store.
//!
//! New digests use Argon2id. Digests written by older deployments (plain
//! hex-encoded SHA-256) are still accepted for verification.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Length of a hex-encoded SHA-256 digest.
const LEGACY_DIGEST_LEN: usize = 64;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Password is empty.
    #[error("password must not be empty")]
    Empty,

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Password hash is invalid.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Password verification failed (wrong password).
    #[error("password verification failed")]
    VerificationFailed,
}

/// Create the Argon2 hasher.
///
/// Parameters: 64 MB memory, 3 iterations, 4 lanes.
fn create_argon2() -> Result<Argon2<'static>, PasswordError> {
    let params =
        Params::new(65536, 3, 4, None).map_err(|e| PasswordError::HashError(e.to_string()))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a password using Argon2id.
///
/// Returns a PHC-formatted hash string that includes the salt and parameters.
///
/// # Examples
///
/// ```
/// use filebox::auth::hash_password;
///
/// let hash = hash_password("admin").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = create_argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored digest.
///
/// Accepts Argon2 PHC strings and legacy hex SHA-256 digests.
pub fn verify_password(password: &str, digest: &str) -> Result<(), PasswordError> {
    if is_legacy_digest(digest) {
        return verify_legacy(password, digest);
    }

    let parsed_hash = PasswordHash::new(digest).map_err(|_| PasswordError::InvalidHash)?;

    // Parameters come from the parsed hash, not from create_argon2()
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// Run a full Argon2 verification that always fails.
///
/// Called for usernames that do not exist, so that rejecting them costs
/// the same as rejecting a wrong password.
pub fn verify_unknown_user(password: &str) -> Result<(), PasswordError> {
    static DECOY: OnceLock<String> = OnceLock::new();

    let decoy = DECOY.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        create_argon2()
            .and_then(|argon2| {
                argon2
                    .hash_password(b"filebox-decoy", &salt)
                    .map(|hash| hash.to_string())
                    .map_err(|e| PasswordError::HashError(e.to_string()))
            })
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to build decoy digest");
                String::new()
            })
    });

    verify_password(password, decoy)?;
    Err(PasswordError::VerificationFailed)
}

/// Whether a stored digest uses the legacy SHA-256 hex format.
pub fn is_legacy_digest(digest: &str) -> bool {
    digest.len() == LEGACY_DIGEST_LEN && digest.bytes().all(|b| b.is_ascii_hexdigit())
}

fn verify_legacy(password: &str, digest: &str) -> Result<(), PasswordError> {
    let computed = format!("{:x}", Sha256::digest(password.as_bytes()));
    let expected = digest.to_ascii_lowercase();

    if bool::from(computed.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(PasswordError::VerificationFailed)
    }
}
