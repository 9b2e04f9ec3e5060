use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand_core::OsRng;

use crate::errors::{AppError, AppResult};

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Length check in characters, not bytes: names and addresses are Cyrillic.
pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::validation(
            field,
            format!("length must be between {min} and {max} characters, got {len}"),
        ));
    }
    Ok(())
}

pub fn check_optional_length(field: &str, value: Option<&str>, min: usize, max: usize) -> AppResult<()> {
    match value {
        Some(value) => check_length(field, value, min, max),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("client123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("client123", &hash).unwrap());
        assert!(!verify_password("client124", &hash).unwrap());
    }

    #[test]
    fn garbage_digest_is_an_internal_error() {
        assert!(matches!(verify_password("x", "not-a-phc-string"), Err(AppError::Internal(_))));
    }

    #[test]
    fn length_counts_characters() {
        assert!(check_length("fullname", "Иван", 3, 4).is_ok());
        assert!(check_length("fullname", "Ив", 3, 4).is_err());
        assert!(check_optional_length("address", None, 1, 2).is_ok());
    }
}
