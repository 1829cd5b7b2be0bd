use crate::api::{
    self,
    cleanup::CleanupConfig,
    handlers::auth::{AuthConfig, Environment},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub signing_key: SecretString,
    pub environment: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub refresh_grace_seconds: i64,
    pub allow_unfingerprinted_sessions: bool,
    pub secure_cookies: bool,
    pub cleanup_interval_seconds: u64,
}

/// Execute the server action.
///
/// Configuration is validated here so a bad signing key refuses to start the
/// process instead of failing per-request.
///
/// # Errors
/// Returns an error if configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let environment: Environment = args
        .environment
        .parse()
        .context("invalid --environment value")?;

    let auth_config = AuthConfig::new(args.signing_key, environment)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_refresh_grace_seconds(args.refresh_grace_seconds)
        .with_allow_unfingerprinted_sessions(args.allow_unfingerprinted_sessions)
        .with_secure_cookies(args.secure_cookies);

    auth_config
        .validate()
        .context("invalid auth configuration")?;

    let cleanup_config =
        CleanupConfig::new().with_interval_seconds(args.cleanup_interval_seconds);

    api::new(args.port, args.dsn, auth_config, cleanup_config).await
}
