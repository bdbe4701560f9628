//! Operator login, session cookie and brute-force limiter settings.

use anyhow::{Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::rampart::{
    attempts::{DEFAULT_MAX_ATTEMPTS, DEFAULT_SWEEP_INTERVAL, DEFAULT_WINDOW},
    token::DEFAULT_SESSION_MAX_AGE,
};

pub const ARG_PASSWORD: &str = "password";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_MAX_AGE_SECONDS: &str = "session-max-age-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_LOGIN_MAX_ATTEMPTS: &str = "login-max-attempts";
pub const ARG_LOGIN_WINDOW_SECONDS: &str = "login-window-seconds";
pub const ARG_LOGIN_SWEEP_SECONDS: &str = "login-sweep-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub password: SecretString,
    pub session_secret: SecretString,
    pub session_max_age_seconds: u64,
    pub cookie_secure: bool,
    pub login: LoginLimits,
}

#[derive(Debug, Clone, Copy)]
pub struct LoginLimits {
    pub max_attempts: u32,
    pub window_seconds: u64,
    pub sweep_seconds: u64,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let required_secret = |id: &str| -> Result<SecretString> {
            match matches.get_one::<String>(id) {
                Some(value) if !value.is_empty() => Ok(SecretString::from(value.clone())),
                _ => bail!("missing required argument: --{id}"),
            }
        };

        Ok(Self {
            password: required_secret(ARG_PASSWORD)?,
            session_secret: required_secret(ARG_SESSION_SECRET)?,
            session_max_age_seconds: matches
                .get_one::<u64>(ARG_SESSION_MAX_AGE_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_SESSION_MAX_AGE.as_secs()),
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            login: LoginLimits {
                max_attempts: matches
                    .get_one::<u32>(ARG_LOGIN_MAX_ATTEMPTS)
                    .copied()
                    .unwrap_or(DEFAULT_MAX_ATTEMPTS),
                window_seconds: matches
                    .get_one::<u64>(ARG_LOGIN_WINDOW_SECONDS)
                    .copied()
                    .unwrap_or(DEFAULT_WINDOW.as_secs()),
                sweep_seconds: matches
                    .get_one::<u64>(ARG_LOGIN_SWEEP_SECONDS)
                    .copied()
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL.as_secs()),
            },
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_login_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Operator password accepted by POST /auth")
                .env("RAMPART_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session tokens")
                .long_help(
                    "Secret used to sign session tokens (HMAC-SHA256).\n\nRotating it invalidates every issued session.",
                )
                .env("RAMPART_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_MAX_AGE_SECONDS)
                .long(ARG_SESSION_MAX_AGE_SECONDS)
                .help(format!(
                    "Session token validity and cookie Max-Age in seconds [default: {}]",
                    DEFAULT_SESSION_MAX_AGE.as_secs()
                ))
                .env("RAMPART_SESSION_MAX_AGE_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve the gateway over HTTPS)")
                .env("RAMPART_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}

fn with_login_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOGIN_MAX_ATTEMPTS)
                .long(ARG_LOGIN_MAX_ATTEMPTS)
                .help(format!(
                    "Login attempts allowed per source within one window [default: {DEFAULT_MAX_ATTEMPTS}]"
                ))
                .env("RAMPART_LOGIN_MAX_ATTEMPTS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LOGIN_WINDOW_SECONDS)
                .long(ARG_LOGIN_WINDOW_SECONDS)
                .help(format!(
                    "Length of the login attempt window in seconds [default: {}]",
                    DEFAULT_WINDOW.as_secs()
                ))
                .env("RAMPART_LOGIN_WINDOW_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_LOGIN_SWEEP_SECONDS)
                .long(ARG_LOGIN_SWEEP_SECONDS)
                .help(format!(
                    "How often expired login attempt records are purged, in seconds [default: {}]",
                    DEFAULT_SWEEP_INTERVAL.as_secs()
                ))
                .env("RAMPART_LOGIN_SWEEP_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("rampart"))
    }

    #[test]
    fn defaults() -> Result<()> {
        temp_env::with_vars(
            [
                ("RAMPART_PASSWORD", None::<&str>),
                ("RAMPART_SESSION_SECRET", None),
                ("RAMPART_COOKIE_SECURE", None),
                ("RAMPART_LOGIN_MAX_ATTEMPTS", None),
            ],
            || {
                let matches = command().get_matches_from(vec![
                    "rampart",
                    "--password",
                    "hunter2",
                    "--session-secret",
                    "s3cr3t",
                ]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.password.expose_secret(), "hunter2");
                assert_eq!(options.session_secret.expose_secret(), "s3cr3t");
                assert_eq!(
                    options.session_max_age_seconds,
                    DEFAULT_SESSION_MAX_AGE.as_secs()
                );
                assert!(!options.cookie_secure);
                assert_eq!(options.login.max_attempts, DEFAULT_MAX_ATTEMPTS);
                assert_eq!(options.login.window_seconds, DEFAULT_WINDOW.as_secs());
                assert_eq!(
                    options.login.sweep_seconds,
                    DEFAULT_SWEEP_INTERVAL.as_secs()
                );
                Ok(())
            },
        )
    }

    #[test]
    fn env_overrides() -> Result<()> {
        temp_env::with_vars(
            [
                ("RAMPART_PASSWORD", Some("from-env")),
                ("RAMPART_SESSION_SECRET", Some("env-secret")),
                ("RAMPART_SESSION_MAX_AGE_SECONDS", Some("3600")),
                ("RAMPART_COOKIE_SECURE", Some("true")),
                ("RAMPART_LOGIN_MAX_ATTEMPTS", Some("3")),
                ("RAMPART_LOGIN_WINDOW_SECONDS", Some("60")),
                ("RAMPART_LOGIN_SWEEP_SECONDS", Some("30")),
            ],
            || {
                let matches = command().get_matches_from(vec!["rampart"]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.password.expose_secret(), "from-env");
                assert_eq!(options.session_max_age_seconds, 3600);
                assert!(options.cookie_secure);
                assert_eq!(options.login.max_attempts, 3);
                assert_eq!(options.login.window_seconds, 60);
                assert_eq!(options.login.sweep_seconds, 30);
                Ok(())
            },
        )
    }

    #[test]
    fn missing_or_empty_secret_is_an_error() {
        temp_env::with_vars(
            [
                ("RAMPART_PASSWORD", None::<&str>),
                ("RAMPART_SESSION_SECRET", Some("")),
            ],
            || {
                let matches = command().get_matches_from(vec!["rampart"]);
                let result = Options::parse(&matches);
                assert!(
                    result
                        .err()
                        .is_some_and(|err| err.to_string().contains("--password"))
                );

                let matches =
                    command().get_matches_from(vec!["rampart", "--password", "hunter2"]);
                let result = Options::parse(&matches);
                assert!(
                    result
                        .err()
                        .is_some_and(|err| err.to_string().contains("--session-secret"))
                );
            },
        );
    }

    #[test]
    fn debug_does_not_leak_secrets() -> Result<()> {
        temp_env::with_vars([("RAMPART_PASSWORD", None::<&str>)], || {
            let matches = command().get_matches_from(vec![
                "rampart",
                "--password",
                "hunter2",
                "--session-secret",
                "s3cr3t",
            ]);
            let rendered = format!("{:?}", Options::parse(&matches)?);
            assert!(!rendered.contains("hunter2"));
            assert!(!rendered.contains("s3cr3t"));
            Ok(())
        })
    }
}
