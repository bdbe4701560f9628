//! Gateway configuration and the shared state handed to every handler.

use anyhow::{Context, Result, anyhow, ensure};
use axum::http::HeaderName;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{
    attempts::{AttemptPolicy, AttemptTracker},
    clock::{Clock, SystemClock},
    token::{DEFAULT_SESSION_MAX_AGE, SessionCodec},
};

pub const DEFAULT_BACKEND_PATH_PREFIX: &str = "/api/fortress";
pub const DEFAULT_BACKEND_SECRET_HEADER: &str = "x-fortress-secret";
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct GatewayConfig {
    password: SecretString,
    session_secret: SecretString,
    session_max_age: Duration,
    cookie_secure: bool,
    attempts: AttemptPolicy,
    backend_url: Url,
    backend_secret: SecretString,
    backend_path_prefix: String,
    backend_secret_header: HeaderName,
    backend_timeout: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(
        password: SecretString,
        session_secret: SecretString,
        backend_url: Url,
        backend_secret: SecretString,
    ) -> Self {
        Self {
            password,
            session_secret,
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            cookie_secure: false,
            attempts: AttemptPolicy::default(),
            backend_url,
            backend_secret,
            backend_path_prefix: DEFAULT_BACKEND_PATH_PREFIX.to_string(),
            backend_secret_header: HeaderName::from_static(DEFAULT_BACKEND_SECRET_HEADER),
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_session_max_age(mut self, max_age: Duration) -> Self {
        self.session_max_age = max_age;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_attempt_policy(mut self, policy: AttemptPolicy) -> Self {
        self.attempts = policy;
        self
    }

    /// Path inserted between the backend URL and the proxied path. Normalized to
    /// a single leading slash and no trailing slash; empty means none.
    #[must_use]
    pub fn with_backend_path_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim().trim_matches('/');
        self.backend_path_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    #[must_use]
    pub fn with_backend_secret_header(mut self, header: HeaderName) -> Self {
        self.backend_secret_header = header;
        self
    }

    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub(crate) fn password(&self) -> &SecretString {
        &self.password
    }

    #[must_use]
    pub fn session_max_age(&self) -> Duration {
        self.session_max_age
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn attempt_policy(&self) -> &AttemptPolicy {
        &self.attempts
    }

    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    pub(crate) fn backend_secret(&self) -> &SecretString {
        &self.backend_secret
    }

    #[must_use]
    pub fn backend_path_prefix(&self) -> &str {
        &self.backend_path_prefix
    }

    #[must_use]
    pub fn backend_secret_header(&self) -> &HeaderName {
        &self.backend_secret_header
    }

    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        self.backend_timeout
    }

    /// Reject settings the gateway cannot run safely with.
    ///
    /// # Errors
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.password.expose_secret().is_empty(),
            "password must not be empty"
        );
        ensure!(
            !self.session_secret.expose_secret().is_empty(),
            "session secret must not be empty"
        );
        ensure!(
            !self.backend_secret.expose_secret().is_empty(),
            "backend secret must not be empty"
        );
        ensure!(
            matches!(self.backend_url.scheme(), "http" | "https"),
            "backend URL must be http or https, got {}",
            self.backend_url.scheme()
        );
        ensure!(
            self.backend_url.host_str().is_some(),
            "backend URL has no host"
        );
        ensure!(
            self.attempts.max_attempts() > 0,
            "login max attempts must be greater than zero"
        );
        ensure!(
            !self.attempts.window().is_zero(),
            "login window must be greater than zero"
        );
        ensure!(
            !self.attempts.sweep_interval().is_zero(),
            "login sweep interval must be greater than zero"
        );
        ensure!(
            !self.session_max_age.is_zero(),
            "session max age must be greater than zero"
        );
        ensure!(
            !self.backend_timeout.is_zero(),
            "backend timeout must be greater than zero"
        );
        Ok(())
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("password", &"***")
            .field("session_secret", &"***")
            .field("session_max_age", &self.session_max_age)
            .field("cookie_secure", &self.cookie_secure)
            .field("attempts", &self.attempts)
            .field("backend_url", &self.backend_url.as_str())
            .field("backend_secret", &"***")
            .field("backend_path_prefix", &self.backend_path_prefix)
            .field("backend_secret_header", &self.backend_secret_header)
            .field("backend_timeout", &self.backend_timeout)
            .finish()
    }
}

/// Everything the handlers share: config, attempt tracker, codec and the
/// outbound HTTP client.
#[derive(Debug)]
pub struct GatewayState {
    config: GatewayConfig,
    tracker: Arc<AttemptTracker>,
    codec: SessionCodec,
    client: Client,
}

impl GatewayState {
    /// Build state on the system clock.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build state on an explicit clock.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot be built.
    pub fn with_clock(config: GatewayConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let codec = SessionCodec::new(&config.session_secret, config.session_max_age, clock.clone())
            .map_err(|err| anyhow!(err))?;
        let tracker = Arc::new(AttemptTracker::new(config.attempts, clock));
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(config.backend_timeout)
            .no_proxy()
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            config,
            tracker,
            codec,
            client,
        })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<AttemptTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Result<GatewayConfig> {
        Ok(GatewayConfig::new(
            SecretString::from("hunter2".to_string()),
            SecretString::from("session-secret".to_string()),
            Url::parse("http://127.0.0.1:3000")?,
            SecretString::from("backend-secret".to_string()),
        ))
    }

    #[test]
    fn defaults_and_overrides() -> Result<()> {
        let config = config()?;
        assert_eq!(config.session_max_age(), DEFAULT_SESSION_MAX_AGE);
        assert!(!config.cookie_secure());
        assert_eq!(config.backend_path_prefix(), "/api/fortress");
        assert_eq!(config.backend_secret_header().as_str(), "x-fortress-secret");
        assert_eq!(config.backend_timeout(), Duration::from_secs(30));

        let config = config
            .with_session_max_age(Duration::from_secs(60))
            .with_cookie_secure(true)
            .with_backend_path_prefix("v2/admin/")
            .with_backend_secret_header(HeaderName::from_static("x-api-key"))
            .with_backend_timeout(Duration::from_secs(5));
        assert_eq!(config.session_max_age(), Duration::from_secs(60));
        assert!(config.cookie_secure());
        assert_eq!(config.backend_path_prefix(), "/v2/admin");
        assert_eq!(config.backend_secret_header().as_str(), "x-api-key");
        assert_eq!(config.backend_timeout(), Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn empty_prefix_is_allowed() -> Result<()> {
        let config = config()?.with_backend_path_prefix("/");
        assert_eq!(config.backend_path_prefix(), "");
        Ok(())
    }

    #[test]
    fn validate_rejects_bad_settings() -> Result<()> {
        assert!(config()?.validate().is_ok());

        let empty_password = GatewayConfig::new(
            SecretString::from(String::new()),
            SecretString::from("s".to_string()),
            Url::parse("http://127.0.0.1:3000")?,
            SecretString::from("b".to_string()),
        );
        assert!(empty_password.validate().is_err());

        let ftp = GatewayConfig::new(
            SecretString::from("p".to_string()),
            SecretString::from("s".to_string()),
            Url::parse("ftp://127.0.0.1")?,
            SecretString::from("b".to_string()),
        );
        assert!(ftp.validate().is_err());

        let zero_attempts =
            config()?.with_attempt_policy(AttemptPolicy::default().with_max_attempts(0));
        assert!(zero_attempts.validate().is_err());
        Ok(())
    }

    #[test]
    fn debug_redacts_secrets() -> Result<()> {
        let rendered = format!("{:?}", config()?);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("session-secret"));
        assert!(!rendered.contains("backend-secret"));
        Ok(())
    }

    #[test]
    fn state_refuses_invalid_config() -> Result<()> {
        let config = config()?.with_backend_timeout(Duration::ZERO);
        let err = GatewayState::new(config)
            .err()
            .ok_or_else(|| anyhow!("zero timeout was accepted"))?;
        assert!(err.to_string().contains("backend timeout"));
        Ok(())
    }

    #[tokio::test]
    async fn state_builds_from_valid_config() -> Result<()> {
        let state = GatewayState::new(config()?)?;
        assert!(state.tracker().is_empty().await);
        assert_eq!(state.codec().max_age(), DEFAULT_SESSION_MAX_AGE);
        Ok(())
    }
}
