use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Result of comparing a login attempt with the stored password column.
#[derive(Debug, PartialEq, Eq)]
pub enum PasswordCheck {
    Match,
    Mismatch,
    /// The column does not hold a PHC string, e.g. a row imported in plain text.
    Unreadable(String),
}

/// Argon2id with default parameters, encoded as a PHC string for the `password` column.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("hash password: {e}"))
}

pub fn check_password(plain: &str, stored: &str) -> PasswordCheck {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => return PasswordCheck::Unreadable(e.to_string()),
    };
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => PasswordCheck::Match,
        Err(_) => PasswordCheck::Mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_is_phc_and_not_the_plaintext() {
        let hash = hash_password("juanp").unwrap();
        assert_ne!(hash, "juanp");
        assert!(hash.starts_with("$argon2id$"));
        assert_eq!(check_password("juanp", &hash), PasswordCheck::Match);
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let a = hash_password("juanp").unwrap();
        let b = hash_password("juanp").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_password_is_a_mismatch() {
        let hash = hash_password("juanp").unwrap();
        assert_eq!(check_password("JUANP", &hash), PasswordCheck::Mismatch);
    }

    #[test]
    fn plaintext_column_is_unreadable_not_a_match() {
        assert!(matches!(
            check_password("juanp", "juanp"),
            PasswordCheck::Unreadable(_)
        ));
    }
}
