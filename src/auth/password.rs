use std::sync::OnceLock;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::error::{AppError, AppResult};

/// Hash a password with Argon2id and a fresh random salt.
///
/// The returned PHC string carries algorithm, parameters, salt and digest.
pub fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("argon2 hash_password failed: {}", e)))
}

/// Verify `plain` against a stored PHC string. The digest comparison is
/// constant time; a malformed stored hash is an error, never a match.
pub fn verify_password(plain: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("argon2 parse hash failed: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

fn dummy_hash() -> Option<&'static String> {
    DUMMY_HASH
        .get_or_init(|| hash_password("healthtrack-dummy-password").ok())
        .as_ref()
}

/// Compute the hash used by [`verify_dummy`] up front, so the first login
/// with an unknown identifier does not also pay for hashing.
pub fn warm_dummy_hash() {
    dummy_hash();
}

/// Burn the same amount of work as a real verification. Used when the login
/// identifier matches no account so response timing does not reveal it.
pub fn verify_dummy(plain: &str) {
    if let Some(hash) = dummy_hash() {
        let _ = verify_password(plain, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").unwrap();
        assert!(!verify_password("wrong-password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn test_warm_dummy_hash_initializes_once() {
        warm_dummy_hash();
        let first = DUMMY_HASH.get().cloned().flatten().unwrap();
        warm_dummy_hash();
        verify_dummy("whatever");
        assert_eq!(DUMMY_HASH.get().cloned().flatten().unwrap(), first);
        assert!(first.starts_with("$argon2"));
    }

    #[test]
    fn test_verify_dummy_does_not_panic() {
        verify_dummy("whatever");
        verify_dummy("");
    }
}
