use crate::{
    cli::telemetry,
    rampart::{self, attempts::AttemptPolicy, state::GatewayConfig},
};
use anyhow::Result;
use axum::http::HeaderName;
use secrecy::SecretString;
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub password: SecretString,
    pub session_secret: SecretString,
    pub session_max_age_seconds: u64,
    pub cookie_secure: bool,
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub login_sweep_seconds: u64,
    pub backend_url: Url,
    pub backend_secret: SecretString,
    pub backend_path_prefix: String,
    pub backend_secret_header: HeaderName,
    pub backend_timeout_seconds: u64,
}

impl Args {
    fn gateway_config(self) -> GatewayConfig {
        let policy = AttemptPolicy::default()
            .with_max_attempts(self.login_max_attempts)
            .with_window(Duration::from_secs(self.login_window_seconds))
            .with_sweep_interval(Duration::from_secs(self.login_sweep_seconds));

        GatewayConfig::new(
            self.password,
            self.session_secret,
            self.backend_url,
            self.backend_secret,
        )
        .with_session_max_age(Duration::from_secs(self.session_max_age_seconds))
        .with_cookie_secure(self.cookie_secure)
        .with_attempt_policy(policy)
        .with_backend_path_prefix(&self.backend_path_prefix)
        .with_backend_secret_header(self.backend_secret_header)
        .with_backend_timeout(Duration::from_secs(self.backend_timeout_seconds))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid (checked when the gateway
/// state is built) or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let port = args.port;
    let config = args.gateway_config();

    log_startup_args(port, &config);

    let result = rampart::new(port, config).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(port: u16, config: &GatewayConfig) {
    let policy = config.attempt_policy();
    let entries = [
        ("listen", format!("tcp:{port}")),
        ("backend_url", config.backend_url().to_string()),
        (
            "backend_path_prefix",
            if config.backend_path_prefix().is_empty() {
                "none".to_string()
            } else {
                config.backend_path_prefix().to_string()
            },
        ),
        (
            "backend_secret_header",
            config.backend_secret_header().as_str().to_string(),
        ),
        ("backend_secret", "***".to_string()),
        (
            "backend_timeout",
            format!("{}s", config.backend_timeout().as_secs()),
        ),
        ("password", "***".to_string()),
        ("session_secret", "***".to_string()),
        (
            "session_max_age",
            format!("{}s", config.session_max_age().as_secs()),
        ),
        ("cookie_secure", config.cookie_secure().to_string()),
        ("login_max_attempts", policy.max_attempts().to_string()),
        ("login_window", format!("{}s", policy.window().as_secs())),
        (
            "login_sweep_interval",
            format!("{}s", policy.sweep_interval().as_secs()),
        ),
    ];
    info!("{}", startup_message(&entries));
}

fn startup_message(entries: &[(&str, String)]) -> String {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\nStartup configuration:", rampart_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    message
}

fn rampart_banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    RAMPART_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const RAMPART_BANNER: &str = r"
  _   _   _   _   _
 | |_| |_| |_| |_| |
 |                 |
 |   R A M P A R T |{VERSION}
 |_________________|";

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn args() -> Result<Args> {
        Ok(Args {
            port: 8080,
            password: SecretString::from("hunter2".to_string()),
            session_secret: SecretString::from("session-secret".to_string()),
            session_max_age_seconds: 3600,
            cookie_secure: true,
            login_max_attempts: 3,
            login_window_seconds: 60,
            login_sweep_seconds: 10,
            backend_url: Url::parse("http://127.0.0.1:3000")?,
            backend_secret: SecretString::from("backend-secret".to_string()),
            backend_path_prefix: "/v1".to_string(),
            backend_secret_header: HeaderName::from_static("x-api-key"),
            backend_timeout_seconds: 5,
        })
    }

    #[test]
    fn args_map_onto_gateway_config() -> Result<()> {
        let config = args()?.gateway_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_max_age(), Duration::from_secs(3600));
        assert!(config.cookie_secure());
        assert_eq!(config.attempt_policy().max_attempts(), 3);
        assert_eq!(config.attempt_policy().window(), Duration::from_secs(60));
        assert_eq!(
            config.attempt_policy().sweep_interval(),
            Duration::from_secs(10)
        );
        assert_eq!(config.backend_path_prefix(), "/v1");
        assert_eq!(config.backend_secret_header().as_str(), "x-api-key");
        assert_eq!(config.backend_timeout(), Duration::from_secs(5));
        assert_eq!(config.password().expose_secret(), "hunter2");
        Ok(())
    }

    #[test]
    fn zero_window_fails_validation() -> Result<()> {
        let mut args = args()?;
        args.login_window_seconds = 0;
        assert!(args.gateway_config().validate().is_err());
        Ok(())
    }

    #[test]
    fn startup_message_aligns_and_redacts() {
        let message = startup_message(&[
            ("listen", "tcp:8080".to_string()),
            ("password", "***".to_string()),
        ]);
        assert!(message.contains("R A M P A R T"));
        assert!(message.contains("\n  listen:   tcp:8080"));
        assert!(message.contains("\n  password: ***"));
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }
}
