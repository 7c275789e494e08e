/// Password Hashing and Verification
///
/// Handles password hashing with bcrypt and password policy validation.
/// bcrypt embeds a fresh random salt in every digest, so hashing the same
/// password twice yields different digests that both verify.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password using bcrypt
///
/// # Arguments
/// * `password` - Plain text password to hash
///
/// # Errors
/// Returns error if:
/// - Password fails policy validation (too short/long)
/// - Bcrypt hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    validate_password_policy(password)?;

    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its stored digest
///
/// Any mismatch - including a malformed digest string - verifies false;
/// this never errors out of the login path.
pub fn verify_password(password: &str, digest: &str) -> bool {
    verify(password, digest).unwrap_or(false)
}

/// Validate password policy
///
/// Requirements:
/// - Minimum 8 characters
/// - Maximum 128 characters (bcrypt limitation and DoS prevention)
fn validate_password_policy(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        )));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    Ok(())
}
