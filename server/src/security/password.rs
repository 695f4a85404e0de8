/// Password hashing and verification using Argon2id
use crate::error::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use zxcvbn::zxcvbn;

/// Hash a password using Argon2id
///
/// Enforces a zxcvbn score >= 3 before hashing, then produces a
/// PHC-formatted hash string safe for database storage. Salt is random
/// per password.
pub fn hash_password(password: &str) -> Result<String> {
    validate_password_strength(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its PHC-formatted hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Validate password strength: minimum length, character classes, and
/// zxcvbn entropy score >= 3.
fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_uppercase || !has_lowercase || !has_digit {
        return Err(AppError::ValidationError(
            "Password must contain uppercase, lowercase and a digit".to_string(),
        ));
    }

    let entropy = zxcvbn(password, &[])
        .map_err(|e| AppError::Internal(format!("Password entropy calculation failed: {}", e)))?;

    if entropy.score() < 3 {
        return Err(AppError::ValidationError(
            "Password is too weak. Please use a stronger password.".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_valid_password() {
        let password = "StrongP@ssw0rd!";
        let hash = hash_password(password).expect("should hash password successfully");
        assert!(verify_password(password, &hash).expect("should verify successfully"));
    }

    #[test]
    fn verify_wrong_password() {
        let password = "StrongP@ssw0rd!";
        let hash = hash_password(password).expect("should hash password successfully");
        assert!(!verify_password("WrongPassword123!", &hash).expect("verification should succeed"));
    }

    #[test]
    fn weak_password_too_short() {
        let result = hash_password("Sh0rt!");
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn weak_password_no_digit() {
        let result = hash_password("password password");
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn different_hashes_for_same_password() {
        let password = "StrongP@ssw0rd!";
        let hash1 = hash_password(password).expect("should hash successfully");
        let hash2 = hash_password(password).expect("should hash successfully");
        // Different salts should produce different hashes
        assert_ne!(hash1, hash2);
    }
}
