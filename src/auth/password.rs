// Salted password digests and registration-time input checks

use crate::core::errors::AttendanceError;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// `salt$digest`, both hex. Digest = SHA-256(salt_bytes || password).
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", hex::encode(salt), digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    digest(&salt, password) == expected
}

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Minimum 8 characters and at least three of: lowercase, uppercase,
/// digit, other.
pub fn validate_password_strength(password: &str) -> Result<(), AttendanceError> {
    if password.len() < 8 {
        return Err(AttendanceError::InvalidInput(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let classes = [
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    if classes.iter().filter(|present| **present).count() < 3 {
        return Err(AttendanceError::InvalidInput(
            "password needs at least three character classes".to_string(),
        ));
    }
    Ok(())
}

/// Structural check only: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), AttendanceError> {
    let invalid = || AttendanceError::InvalidInput("invalid email address".to_string());
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || email.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(())
}
