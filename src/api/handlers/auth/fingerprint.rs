//! Fingerprint binding for browser session tokens.
//!
//! A random value travels in a cookie the page scripts cannot read, its
//! SHA-256 hash travels inside the signed token. A stolen token alone fails
//! verification because the cookie half is missing.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::middleware::cookie_value;

/// Cookie name in deployments served over HTTPS. The `__Secure-` prefix is
/// enforced by browsers: such cookies only stick when set over TLS.
pub const SECURE_FINGERPRINT_COOKIE: &str = "__Secure-Fgp";

/// Fallback cookie name for plain-HTTP development setups.
pub const DEV_FINGERPRINT_COOKIE: &str = "Fgp";

const FINGERPRINT_BYTES: usize = 32;

/// Raw fingerprint for the cookie and its hash for the token claim.
pub struct FingerprintPair {
    pub raw: String,
    pub hashed: String,
}

#[must_use]
pub fn generate_pair() -> FingerprintPair {
    let mut bytes = [0u8; FINGERPRINT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let raw = URL_SAFE_NO_PAD.encode(bytes);
    let hashed = hash_fingerprint(&raw);
    FingerprintPair { raw, hashed }
}

#[must_use]
pub fn hash_fingerprint(raw: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(raw.as_bytes()))
}

/// Compare the cookie value against the hash carried in the token claim.
/// The comparison is constant-time over the digest bytes.
#[must_use]
pub fn verify(raw: &str, hashed: &str) -> bool {
    if raw.is_empty() || hashed.is_empty() {
        return false;
    }
    let Ok(expected) = URL_SAFE_NO_PAD.decode(hashed) else {
        return false;
    };
    let actual = Sha256::digest(raw.as_bytes());
    expected.as_slice().ct_eq(actual.as_slice()).into()
}

/// Pull the raw fingerprint from the request, preferring the hardened
/// cookie name over the development one.
#[must_use]
pub fn extract_fingerprint(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SECURE_FINGERPRINT_COOKIE)
        .or_else(|| cookie_value(headers, DEV_FINGERPRINT_COOKIE))
}

/// Cookie name to set for new sessions in this deployment.
#[must_use]
pub const fn cookie_name(secure_cookies: bool) -> &'static str {
    if secure_cookies {
        SECURE_FINGERPRINT_COOKIE
    } else {
        DEV_FINGERPRINT_COOKIE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    #[test]
    fn pair_round_trips() {
        let pair = generate_pair();
        assert!(verify(&pair.raw, &pair.hashed));
    }

    #[test]
    fn pairs_are_unique() {
        let a = generate_pair();
        let b = generate_pair();
        assert_ne!(a.raw, b.raw);
        assert_ne!(a.hashed, b.hashed);
    }

    #[test]
    fn mismatched_raw_fails() {
        let pair = generate_pair();
        let other = generate_pair();
        assert!(!verify(&other.raw, &pair.hashed));
    }

    #[test]
    fn empty_inputs_fail() {
        let pair = generate_pair();
        assert!(!verify("", &pair.hashed));
        assert!(!verify(&pair.raw, ""));
    }

    #[test]
    fn non_base64_hash_fails() {
        let pair = generate_pair();
        assert!(!verify(&pair.raw, "not base64!!"));
    }

    #[test]
    fn extraction_prefers_hardened_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "Fgp=dev; __Secure-Fgp=hardened".parse().unwrap());
        assert_eq!(extract_fingerprint(&headers).as_deref(), Some("hardened"));
    }

    #[test]
    fn extraction_falls_back_to_dev_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "Fgp=dev".parse().unwrap());
        assert_eq!(extract_fingerprint(&headers).as_deref(), Some("dev"));
    }

    #[test]
    fn extraction_handles_missing_cookie() {
        assert!(extract_fingerprint(&HeaderMap::new()).is_none());
    }

    #[test]
    fn cookie_name_follows_deployment() {
        assert_eq!(cookie_name(true), SECURE_FINGERPRINT_COOKIE);
        assert_eq!(cookie_name(false), DEV_FINGERPRINT_COOKIE);
    }
}
