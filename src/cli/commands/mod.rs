pub mod auth;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("gatehouse")
        .about("Token-based authentication core")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("GATEHOUSE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("GATEHOUSE_DSN")
                .required(true),
        );

    let command = auth::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_ARGS: [&str; 7] = [
        "gatehouse",
        "--dsn",
        "postgres://localhost:5432/gatehouse",
        "--signing-key",
        "c2l4dHktZm91ci1ieXRlcy1vZi1wdXJlLXNpZ25pbmctZW50cm9weS1nb2VzLWhlcmU",
        "--allow-unfingerprinted-sessions",
        "false",
    ];

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "gatehouse");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Token-based authentication core".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        let matches = new().get_matches_from(BASE_ARGS);
        assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
        assert_eq!(
            matches.get_one::<i64>(auth::ARG_ACCESS_TOKEN_TTL).copied(),
            Some(1800)
        );
        assert_eq!(
            matches.get_one::<i64>(auth::ARG_REFRESH_TOKEN_TTL).copied(),
            Some(604_800)
        );
        assert_eq!(
            matches.get_one::<i64>(auth::ARG_REFRESH_GRACE).copied(),
            Some(300)
        );
        assert_eq!(
            matches.get_one::<bool>(auth::ARG_SECURE_COOKIES).copied(),
            Some(true)
        );
        assert_eq!(
            matches.get_one::<u64>(auth::ARG_CLEANUP_INTERVAL).copied(),
            Some(3600)
        );
        assert_eq!(
            matches.get_one::<String>(auth::ARG_ENVIRONMENT).cloned(),
            Some("development".to_string())
        );
    }

    #[test]
    fn test_unfingerprinted_flag_is_required() {
        let result = new().try_get_matches_from(vec![
            "gatehouse",
            "--dsn",
            "postgres://localhost:5432/gatehouse",
            "--signing-key",
            "c2l4dHktZm91ci1ieXRlcy1vZi1wdXJlLXNpZ25pbmctZW50cm9weS1nb2VzLWhlcmU",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_port_env_override() {
        temp_env::with_var("GATEHOUSE_PORT", Some("9090"), || {
            let matches = new().get_matches_from(BASE_ARGS);
            assert_eq!(matches.get_one::<u16>("port").copied(), Some(9090));
        });
    }

    #[test]
    fn test_environment_rejects_unknown() {
        let mut args = BASE_ARGS.to_vec();
        args.extend(["--environment", "staging"]);
        assert!(new().try_get_matches_from(args).is_err());
    }
}
