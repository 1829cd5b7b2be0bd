//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        signing_key: auth_opts.signing_key,
        environment: auth_opts.environment,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        refresh_grace_seconds: auth_opts.refresh_grace_seconds,
        allow_unfingerprinted_sessions: auth_opts.allow_unfingerprinted_sessions,
        secure_cookies: auth_opts.secure_cookies,
        cleanup_interval_seconds: auth_opts.cleanup_interval_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::handler;
    use crate::cli::{actions::Action, commands};

    #[test]
    fn handler_builds_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "gatehouse",
            "--port",
            "8443",
            "--dsn",
            "postgres://localhost:5432/gatehouse",
            "--signing-key",
            "c2l4dHktZm91ci1ieXRlcy1vZi1wdXJlLXNpZ25pbmctZW50cm9weS1nb2VzLWhlcmU",
            "--allow-unfingerprinted-sessions",
            "true",
        ]);

        let action = handler(&matches).expect("handler should succeed");
        let Action::Server(args) = action;
        assert_eq!(args.port, 8443);
        assert_eq!(args.dsn, "postgres://localhost:5432/gatehouse");
        assert_eq!(args.environment, "development");
        assert!(args.allow_unfingerprinted_sessions);
        assert_eq!(args.cleanup_interval_seconds, 3600);
    }
}
