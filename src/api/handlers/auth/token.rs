//! Session token issuance and verification (HS256).

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ISSUER: &str = "gatehouse";
pub const AUDIENCE: &str = "gatehouse-api";

/// Tolerated clock drift between issuing and verifying hosts.
const CLOCK_SKEW_SECONDS: u64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    /// Browser session token, expected to carry a fingerprint hash.
    Session,
    /// Programmatic token for non-browser clients, never fingerprinted.
    Api,
}

/// Tokens minted before the discriminator existed carry no `token_use`
/// claim; they were all session tokens.
impl Default for TokenUse {
    fn default() -> Self {
        Self::Session
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(default)]
    pub token_use: TokenUse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fph: Option<String>,
}

/// Outcome of token verification. Expired and forged tokens are both
/// rejected but are distinct outcomes so callers can log them apart.
#[derive(Debug)]
pub enum Verification {
    Valid(Claims),
    Expired,
    Forged,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_seconds: i64,
    refresh_grace_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(key: &[u8], access_token_ttl_seconds: i64, refresh_grace_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            access_token_ttl_seconds,
            refresh_grace_seconds,
        }
    }

    /// Issue a signed token for the subject. Session tokens carry the
    /// fingerprint hash in the `fph` claim, API tokens must not.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue(
        &self,
        subject: &str,
        token_use: TokenUse,
        fingerprint_hash: Option<&str>,
    ) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: now,
            exp: now + self.access_token_ttl_seconds,
            jti: Uuid::new_v4().to_string(),
            token_use,
            fph: fingerprint_hash.map(ToString::to_string),
        };
        self.sign(&claims)
    }

    pub(super) fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .context("failed to sign token")
    }

    /// Verify signature, issuer, audience and expiry.
    ///
    /// Signature checks run before expiry checks, so a tampered token is
    /// reported as forged even when its timestamps are also stale.
    #[must_use]
    pub fn verify(&self, token: &str) -> Verification {
        match decode::<Claims>(token, &self.decoding_key, &self.validation(true)) {
            Ok(data) => Verification::Valid(data.claims),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Verification::Expired,
                _ => Verification::Forged,
            },
        }
    }

    /// A token may mint a successor through the refresh flow while still
    /// valid or for a short grace window after expiry. Forged tokens and
    /// subject mismatches are never eligible.
    #[must_use]
    pub fn is_eligible_for_refresh(&self, token: &str, subject: &str) -> bool {
        let Ok(data) = decode::<Claims>(token, &self.decoding_key, &self.validation(false)) else {
            return false;
        };
        if data.claims.sub != subject {
            return false;
        }
        let now = Utc::now().timestamp();
        data.claims.exp + self.refresh_grace_seconds > now
    }

    fn validation(&self, validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_SECONDS;
        validation.validate_exp = validate_exp;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation
    }
}
