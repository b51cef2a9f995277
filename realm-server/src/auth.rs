//! Account credentials: bcrypt password hashes.
//!
//! The stored form is bcrypt's own `$2b$<cost>$<salt+digest>` string, so the
//! salt and cost travel with the hash.

use thiserror::Error;

/// bcrypt work factor for new hashes. Existing hashes keep the cost they were
/// created with.
pub const PASSWORD_COST: u32 = 10;
pub const MAX_USERNAME_LEN: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Username must not be empty.")]
    EmptyUsername,
    #[error("Username must be at most {} characters.", MAX_USERNAME_LEN)]
    UsernameTooLong,
    #[error("Username may only contain letters, digits, '_' and '-'.")]
    InvalidCharacters,
    #[error("Password must not be empty.")]
    EmptyPassword,
}

/// Checks a registration request before it reaches storage.
pub fn validate_credentials(username: &str, password: &str) -> Result<(), CredentialError> {
    if username.is_empty() {
        return Err(CredentialError::EmptyUsername);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(CredentialError::UsernameTooLong);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CredentialError::InvalidCharacters);
    }
    if password.is_empty() {
        return Err(CredentialError::EmptyPassword);
    }
    Ok(())
}

/// Salted bcrypt hash of `password` at [`PASSWORD_COST`].
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, PASSWORD_COST)
}

/// Checks `password` against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_stored_format_carries_cost() {
        let stored = hash_password("pw").unwrap();
        assert!(stored.starts_with(&format!("$2b${}$", PASSWORD_COST)));
        assert_eq!(stored.len(), 60);
        assert!(!stored.contains("pw"));
    }

    #[test]
    fn test_hash_from_other_cost_still_verifies() {
        let cheap = bcrypt::hash("pw", 4).unwrap();
        assert!(verify_password("pw", &cheap));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "nodollar"));
        assert!(!verify_password("pw", "zz$zz"));
        assert!(!verify_password("pw", "$2b$10$tooshort"));
    }

    #[test]
    fn test_validate_credentials() {
        assert_eq!(validate_credentials("ana_01", "pw"), Ok(()));
        assert_eq!(validate_credentials("", "pw"), Err(CredentialError::EmptyUsername));
        assert_eq!(
            validate_credentials("has space", "pw"),
            Err(CredentialError::InvalidCharacters)
        );
        assert_eq!(
            validate_credentials(&"a".repeat(25), "pw"),
            Err(CredentialError::UsernameTooLong)
        );
        assert_eq!(validate_credentials("ana", ""), Err(CredentialError::EmptyPassword));
    }
}
