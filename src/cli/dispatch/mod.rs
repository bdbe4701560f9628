//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, which today is always the
//! gateway server with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, auth, backend};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let auth_opts = auth::Options::parse(matches)?;
    let backend_opts = backend::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        password: auth_opts.password,
        session_secret: auth_opts.session_secret,
        session_max_age_seconds: auth_opts.session_max_age_seconds,
        cookie_secure: auth_opts.cookie_secure,
        login_max_attempts: auth_opts.login.max_attempts,
        login_window_seconds: auth_opts.login.window_seconds,
        login_sweep_seconds: auth_opts.login.sweep_seconds,
        backend_url: backend_opts.url,
        backend_secret: backend_opts.secret,
        backend_path_prefix: backend_opts.path_prefix,
        backend_secret_header: backend_opts.secret_header,
        backend_timeout_seconds: backend_opts.timeout_seconds,
    }))
}
