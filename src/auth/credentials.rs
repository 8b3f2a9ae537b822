//! Password hashing and credential format checks.

use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn check_email(email: &str) -> Result<(), ApiError> {
    if email.chars().count() > 180 || !EMAIL_RE.is_match(email) {
        return Err(ApiError::validation("Email inválido"));
    }
    Ok(())
}

pub fn check_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "La contraseña debe tener al menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }
    Ok(())
}

/// Argon2id PHC string for `plain` with a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow!("argon2 hash failed: {e}"))
}

/// `Ok(false)` on mismatch; `Err` only when `stored` is not a PHC string.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("stored hash unreadable: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("password123").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("password123", &hash).expect("verify"));
        assert!(!verify_password("password124", &hash).expect("verify"));
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert!(verify_password("anything", "plaintext").is_err());
    }

    #[test]
    fn email_format() {
        assert!(check_email("usuario1@test.com").is_ok());
        assert!(check_email("usuario1@test").is_err());
        assert!(check_email("no spaces@test.com").is_err());
        assert!(check_email("").is_err());
    }

    #[test]
    fn password_length() {
        assert!(check_password("1234567").is_err());
        assert!(check_password("12345678").is_ok());
    }
}
