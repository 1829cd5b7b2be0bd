//! Token and cookie arguments for the auth core.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl-seconds";
pub const ARG_REFRESH_GRACE: &str = "refresh-grace-seconds";
pub const ARG_ALLOW_UNFINGERPRINTED: &str = "allow-unfingerprinted-sessions";
pub const ARG_SECURE_COOKIES: &str = "secure-cookies";
pub const ARG_CLEANUP_INTERVAL: &str = "cleanup-interval-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("Token signing key, base64 or raw (min 256 bits). Generate with: openssl rand -base64 32")
                .env("GATEHOUSE_SIGNING_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment; 'production' rejects known test signing keys")
                .env("GATEHOUSE_ENVIRONMENT")
                .default_value("development")
                .value_parser(["development", "production"]),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token lifetime in seconds")
                .env("GATEHOUSE_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh credential lifetime in seconds")
                .env("GATEHOUSE_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_GRACE)
                .long(ARG_REFRESH_GRACE)
                .help("Window after expiry during which an access token may still be refreshed")
                .env("GATEHOUSE_REFRESH_GRACE_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_ALLOW_UNFINGERPRINTED)
                .long(ARG_ALLOW_UNFINGERPRINTED)
                .help("Accept session tokens without a fingerprint claim (migration aid). No default: pick one.")
                .env("GATEHOUSE_ALLOW_UNFINGERPRINTED_SESSIONS")
                .required(true)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_SECURE_COOKIES)
                .long(ARG_SECURE_COOKIES)
                .help("Mark cookies Secure (disable only for plain-HTTP local development)")
                .env("GATEHOUSE_SECURE_COOKIES")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_CLEANUP_INTERVAL)
                .long(ARG_CLEANUP_INTERVAL)
                .help("Interval between expired refresh credential sweeps, in seconds")
                .env("GATEHOUSE_CLEANUP_INTERVAL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub signing_key: SecretString,
    pub environment: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub refresh_grace_seconds: i64,
    pub allow_unfingerprinted_sessions: bool,
    pub secure_cookies: bool,
    pub cleanup_interval_seconds: u64,
}

impl Options {
    /// Collect auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let signing_key = matches
            .get_one::<String>(ARG_SIGNING_KEY)
            .cloned()
            .context("missing required argument: --signing-key")?;
        let allow_unfingerprinted_sessions = matches
            .get_one::<bool>(ARG_ALLOW_UNFINGERPRINTED)
            .copied()
            .context("missing required argument: --allow-unfingerprinted-sessions")?;

        Ok(Self {
            signing_key: SecretString::from(signing_key),
            environment: matches
                .get_one::<String>(ARG_ENVIRONMENT)
                .cloned()
                .unwrap_or_else(|| "development".to_string()),
            access_token_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL)
                .copied()
                .unwrap_or(1800),
            refresh_token_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL)
                .copied()
                .unwrap_or(604_800),
            refresh_grace_seconds: matches
                .get_one::<i64>(ARG_REFRESH_GRACE)
                .copied()
                .unwrap_or(300),
            allow_unfingerprinted_sessions,
            secure_cookies: matches
                .get_one::<bool>(ARG_SECURE_COOKIES)
                .copied()
                .unwrap_or(true),
            cleanup_interval_seconds: matches
                .get_one::<u64>(ARG_CLEANUP_INTERVAL)
                .copied()
                .unwrap_or(3600),
        })
    }
}
