//! Password verification seam.

use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier as _};
use tracing::debug;

/// Checks a candidate password against a stored hash. Kept behind a trait so
/// tests can swap in a deterministic verifier and deployments can move hash
/// schemes without touching the handlers.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, candidate: &str, stored_hash: &str) -> bool;
}

/// Argon2id verifier over PHC-format hashes.
pub struct Argon2Verifier;

impl PasswordVerifier for Argon2Verifier {
    fn verify(&self, candidate: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            debug!("stored password hash is not in PHC format");
            return false;
        };
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::PasswordHasher;

    fn hash(password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[test]
    fn accepts_matching_password() {
        let stored = hash("hunter2!");
        assert!(Argon2Verifier.verify("hunter2!", &stored));
    }

    #[test]
    fn rejects_wrong_password() {
        let stored = hash("hunter2!");
        assert!(!Argon2Verifier.verify("hunter3!", &stored));
    }

    #[test]
    fn rejects_malformed_stored_hash() {
        assert!(!Argon2Verifier.verify("hunter2!", "plaintext-not-a-hash"));
    }
}
