//! # Gatehouse (Token-Based Authentication Core)
//!
//! `gatehouse` is the authentication core of a record-management application.
//! It issues short-lived signed session tokens, tracks long-lived refresh
//! credentials in Postgres with single-active-session rotation, and binds
//! browser sessions to a secondary fingerprint secret so a stolen token is
//! useless without the matching cookie.
//!
//! ## Session model
//!
//! - **Session tokens** are HS256-signed JWTs carrying `sub`, `iss`, `aud`,
//!   `iat`, `exp`, `jti`, a `token_use` discriminator (`session` vs `api`),
//!   and, for browser sessions, an `fph` fingerprint-hash claim.
//! - **Refresh credentials** are opaque random strings stored server-side.
//!   Each use rotates the credential: the old row is revoked and a new one is
//!   created in a single row-locked transaction, so a replayed credential
//!   loses the race and is rejected.
//! - **Fingerprint binding** pairs a random cookie value with its SHA-256
//!   hash embedded in the token. Verification recomputes the hash from the
//!   presented cookie and compares in constant time.
//!
//! Creating a refresh credential revokes all prior credentials for the same
//! principal (single active session). Expired rows are swept by a background
//! task; revoked-but-unexpired rows are kept until they age out.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
