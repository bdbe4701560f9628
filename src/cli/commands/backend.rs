//! Backend (control plane) connection settings.

use anyhow::{Context, Result, bail};
use axum::http::HeaderName;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

use crate::rampart::state::{
    DEFAULT_BACKEND_PATH_PREFIX, DEFAULT_BACKEND_SECRET_HEADER, DEFAULT_BACKEND_TIMEOUT,
};

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_BACKEND_SECRET: &str = "backend-secret";
pub const ARG_BACKEND_PATH_PREFIX: &str = "backend-path-prefix";
pub const ARG_BACKEND_SECRET_HEADER: &str = "backend-secret-header";
pub const ARG_BACKEND_TIMEOUT_SECONDS: &str = "backend-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: Url,
    pub secret: SecretString,
    pub path_prefix: String,
    pub secret_header: HeaderName,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse backend arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the URL, secret or header name is missing or invalid.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = match matches.get_one::<String>(ARG_BACKEND_URL) {
            Some(value) if !value.trim().is_empty() => value.trim(),
            _ => bail!("missing required argument: --{ARG_BACKEND_URL}"),
        };
        let url = Url::parse(url).with_context(|| format!("invalid --{ARG_BACKEND_URL}: {url}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "invalid --{ARG_BACKEND_URL}: scheme must be http or https, got {}",
                url.scheme()
            );
        }

        let secret = match matches.get_one::<String>(ARG_BACKEND_SECRET) {
            Some(value) if !value.is_empty() => SecretString::from(value.clone()),
            _ => bail!("missing required argument: --{ARG_BACKEND_SECRET}"),
        };

        let secret_header = matches
            .get_one::<String>(ARG_BACKEND_SECRET_HEADER)
            .map_or(DEFAULT_BACKEND_SECRET_HEADER, String::as_str);
        let secret_header = HeaderName::try_from(secret_header.trim())
            .with_context(|| format!("invalid --{ARG_BACKEND_SECRET_HEADER}: {secret_header}"))?;

        Ok(Self {
            url,
            secret,
            path_prefix: matches
                .get_one::<String>(ARG_BACKEND_PATH_PREFIX)
                .cloned()
                .unwrap_or_else(|| DEFAULT_BACKEND_PATH_PREFIX.to_string()),
            secret_header,
            timeout_seconds: matches
                .get_one::<u64>(ARG_BACKEND_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_BACKEND_TIMEOUT.as_secs()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Backend base URL, example: http://fortress.internal:3000")
                .env("RAMPART_BACKEND_URL"),
        )
        .arg(
            Arg::new(ARG_BACKEND_SECRET)
                .long(ARG_BACKEND_SECRET)
                .help("Shared secret injected into every proxied request")
                .env("RAMPART_BACKEND_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_BACKEND_PATH_PREFIX)
                .long(ARG_BACKEND_PATH_PREFIX)
                .help("Path inserted between the backend URL and the proxied path")
                .env("RAMPART_BACKEND_PATH_PREFIX")
                .default_value(DEFAULT_BACKEND_PATH_PREFIX),
        )
        .arg(
            Arg::new(ARG_BACKEND_SECRET_HEADER)
                .long(ARG_BACKEND_SECRET_HEADER)
                .help("Header carrying the shared secret")
                .env("RAMPART_BACKEND_SECRET_HEADER")
                .default_value(DEFAULT_BACKEND_SECRET_HEADER),
        )
        .arg(
            Arg::new(ARG_BACKEND_TIMEOUT_SECONDS)
                .long(ARG_BACKEND_TIMEOUT_SECONDS)
                .help(format!(
                    "Timeout for a single proxied request in seconds [default: {}]",
                    DEFAULT_BACKEND_TIMEOUT.as_secs()
                ))
                .env("RAMPART_BACKEND_TIMEOUT_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
}
