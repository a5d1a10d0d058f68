use anyhow::{anyhow, Result};
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;

/// Salted Argon2id digest of a password, ready to persist.
pub struct PasswordRecord {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a fresh per-user salt.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<PasswordRecord> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| anyhow!("failed to hash password"))?
        .to_string();

    Ok(PasswordRecord {
        hash,
        salt: salt.as_str().to_string(),
    })
}

/// Verify a password against a stored PHC hash string.
///
/// # Errors
/// Returns an error if the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|_| anyhow!("invalid stored password hash"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let record = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &record.hash).unwrap());
        assert!(!verify_password("hunter3", &record.hash).unwrap());
    }

    #[test]
    fn test_salt_is_per_user() {
        let one = hash_password("same-password").unwrap();
        let two = hash_password("same-password").unwrap();
        assert_ne!(one.salt, two.salt);
        assert_ne!(one.hash, two.hash);
    }

    #[test]
    fn test_salt_recorded_in_hash() {
        let record = hash_password("hunter2").unwrap();
        assert!(record.hash.contains(&record.salt));
    }

    #[test]
    fn test_invalid_stored_hash() {
        assert!(verify_password("hunter2", "not-a-phc-string").is_err());
    }
}
