//! Auth configuration and shared state.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::{ExposeSecret, SecretString};
use std::{str::FromStr, sync::Arc};

use super::{password::PasswordVerifier, token::TokenIssuer};

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_REFRESH_GRACE_SECONDS: i64 = 5 * 60;

/// Minimum decoded signing key length in bytes (256 bits for HMAC-SHA256).
const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Prefix of the known test/development signing key, rejected in production.
const TEST_KEY_PREFIX: &str = "dGVzdC1zZWNyZXQta2V5";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(anyhow!("unknown environment: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_key: SecretString,
    environment: Environment,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    refresh_grace_seconds: i64,
    allow_unfingerprinted_sessions: bool,
    secure_cookies: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(signing_key: SecretString, environment: Environment) -> Self {
        Self {
            signing_key,
            environment,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            refresh_grace_seconds: DEFAULT_REFRESH_GRACE_SECONDS,
            allow_unfingerprinted_sessions: false,
            secure_cookies: true,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_grace_seconds(mut self, seconds: i64) -> Self {
        self.refresh_grace_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_allow_unfingerprinted_sessions(mut self, allow: bool) -> Self {
        self.allow_unfingerprinted_sessions = allow;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// Check the signing key once at startup so a misconfigured deployment
    /// refuses to start instead of failing per-request.
    ///
    /// # Errors
    /// Returns an error if the key is blank, too short, or a known test key
    /// in a production environment.
    pub fn validate(&self) -> Result<()> {
        let key = self.signing_key.expose_secret();
        if key.trim().is_empty() {
            return Err(anyhow!(
                "signing key must be configured. Generate with: openssl rand -base64 32"
            ));
        }

        if self.environment == Environment::Production && key.starts_with(TEST_KEY_PREFIX) {
            return Err(anyhow!(
                "test signing key detected in production. Set GATEHOUSE_SIGNING_KEY from: openssl rand -base64 32"
            ));
        }

        let decoded = self.signing_key_bytes();
        if decoded.len() < MIN_SIGNING_KEY_BYTES {
            return Err(anyhow!(
                "signing key must be at least 256 bits (32 bytes), got {} bytes",
                decoded.len()
            ));
        }

        if self.access_token_ttl_seconds <= 0 {
            return Err(anyhow!("access token TTL must be positive"));
        }
        if self.refresh_token_ttl_seconds <= 0 {
            return Err(anyhow!("refresh token TTL must be positive"));
        }
        if self.refresh_grace_seconds < 0 {
            return Err(anyhow!("refresh grace window must not be negative"));
        }

        Ok(())
    }

    /// Decoded key material: base64 when it parses, raw bytes otherwise
    /// (legacy plain-text keys are accepted but discouraged).
    #[must_use]
    pub(super) fn signing_key_bytes(&self) -> Vec<u8> {
        let key = self.signing_key.expose_secret();
        STANDARD
            .decode(key.as_bytes())
            .unwrap_or_else(|_| key.as_bytes().to_vec())
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_grace_seconds(&self) -> i64 {
        self.refresh_grace_seconds
    }

    #[must_use]
    pub fn allow_unfingerprinted_sessions(&self) -> bool {
        self.allow_unfingerprinted_sessions
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }
}

pub struct AuthState {
    config: AuthConfig,
    issuer: TokenIssuer,
    password_verifier: Arc<dyn PasswordVerifier>,
}

impl AuthState {
    /// Build the shared auth state, deriving the token issuer from the
    /// validated configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration fails validation.
    pub fn new(config: AuthConfig, password_verifier: Arc<dyn PasswordVerifier>) -> Result<Self> {
        config.validate()?;
        let issuer = TokenIssuer::new(
            &config.signing_key_bytes(),
            config.access_token_ttl_seconds(),
            config.refresh_grace_seconds(),
        );
        Ok(Self {
            config,
            issuer,
            password_verifier,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub(super) fn password_verifier(&self) -> &dyn PasswordVerifier {
        self.password_verifier.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_key() -> SecretString {
        // base64 of 32 bytes
        SecretString::from("YW4tZXhhbXBsZS0yNTYtYml0LXNpZ25pbmcta2V5ISE=")
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = AuthConfig::new(strong_key(), Environment::Development);
        assert_eq!(
            config.access_token_ttl_seconds(),
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.refresh_token_ttl_seconds(),
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS
        );
        assert_eq!(config.refresh_grace_seconds(), DEFAULT_REFRESH_GRACE_SECONDS);
        assert!(!config.allow_unfingerprinted_sessions());
        assert!(config.secure_cookies());

        let config = config
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(120)
            .with_refresh_grace_seconds(30)
            .with_allow_unfingerprinted_sessions(true)
            .with_secure_cookies(false);
        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 120);
        assert_eq!(config.refresh_grace_seconds(), 30);
        assert!(config.allow_unfingerprinted_sessions());
        assert!(!config.secure_cookies());
    }

    #[test]
    fn validate_rejects_blank_key() {
        let config = AuthConfig::new(SecretString::from("  "), Environment::Development);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_short_key() {
        // base64 of "short"
        let config = AuthConfig::new(SecretString::from("c2hvcnQ="), Environment::Development);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_raw_32_byte_key() {
        let config = AuthConfig::new(
            SecretString::from("0123456789abcdef0123456789abcdef"),
            Environment::Development,
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_rejected_only_in_production() {
        // Known test key padded so length alone would pass
        let test_key = format!("{TEST_KEY_PREFIX}LWZvci1sb2NhbC1kZXZlbG9wbWVudC11c2U");

        let dev = AuthConfig::new(SecretString::from(test_key.clone()), Environment::Development);
        assert!(dev.validate().is_ok());

        let prod = AuthConfig::new(SecretString::from(test_key), Environment::Production);
        assert!(prod.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_lifetimes() {
        let config = AuthConfig::new(strong_key(), Environment::Development)
            .with_access_token_ttl_seconds(0);
        assert!(config.validate().is_err());

        let config = AuthConfig::new(strong_key(), Environment::Development)
            .with_refresh_token_ttl_seconds(-1);
        assert!(config.validate().is_err());

        let config = AuthConfig::new(strong_key(), Environment::Development)
            .with_refresh_grace_seconds(-1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn environment_parses_known_values() {
        assert_eq!(
            "development".parse::<Environment>().ok(),
            Some(Environment::Development)
        );
        assert_eq!(
            "production".parse::<Environment>().ok(),
            Some(Environment::Production)
        );
        assert!("staging".parse::<Environment>().is_err());
    }
}
