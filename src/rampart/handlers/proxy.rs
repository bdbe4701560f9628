//! Authenticated pass-through to the backend.
//!
//! The gateway never looks inside the payloads it relays: the inbound body is
//! forwarded as-is, and the upstream status, body and `Content-Type` come back
//! unchanged. Only a failure to reach the backend at all is turned into a 502.

use axum::{
    body::{Body, to_bytes},
    extract::Extension,
    http::{HeaderValue, Method, Uri, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::rampart::{error::GatewayError, state::GatewayConfig, state::GatewayState};

pub const MAX_PROXY_BODY_BYTES: usize = 10 * 1024 * 1024;

pub const PROXY_MOUNT: &str = "/proxy";

/// `<backend_url><prefix>/<rest>[?<query>]`, with the query copied verbatim.
pub fn upstream_url(config: &GatewayConfig, rest: &str, query: Option<&str>) -> String {
    let base = config.backend_url().as_str().trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    let mut url = format!("{base}{}/{rest}", config.backend_path_prefix());
    if let Some(query) = query.filter(|query| !query.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// True when a segment of `rest` is `.` or `..`, percent-encoded or not.
/// URL parsing resolves those, which would move the request outside the
/// backend prefix.
pub fn has_dot_segment(rest: &str) -> bool {
    rest.split(['/', '\\']).any(|segment| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment == "." || segment == ".."
    })
}

#[utoipa::path(
    get,
    path = "/proxy/{rest}",
    params(("rest" = String, Path, description = "Path relayed to the backend")),
    responses(
        (status = 200, description = "Backend response relayed verbatim"),
        (status = 400, description = "Path contains a dot segment", body = super::auth::ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = super::auth::ErrorResponse),
        (status = 502, description = "Backend could not be reached", body = super::auth::ErrorResponse),
    ),
    tag = "proxy"
)]
#[instrument(skip_all, fields(method = %method, path = %uri.path()))]
pub async fn forward(
    state: Extension<Arc<GatewayState>>,
    method: Method,
    uri: Uri,
    body: Body,
) -> Result<Response, GatewayError> {
    let config = state.config();
    // Taken from the raw URI so percent-encoding reaches the backend untouched.
    let rest = uri.path().strip_prefix(PROXY_MOUNT).unwrap_or(uri.path());
    if has_dot_segment(rest) {
        warn!("rejected proxy path with dot segment");
        return Err(GatewayError::BadRequest);
    }
    let url = upstream_url(config, rest, uri.query());

    let mut request = state
        .client()
        .request(method.clone(), &url)
        .header(
            config.backend_secret_header().clone(),
            config.backend_secret().expose_secret(),
        )
        .header(CONTENT_TYPE, "application/json");

    if method != Method::GET && method != Method::HEAD {
        match to_bytes(body, MAX_PROXY_BODY_BYTES).await {
            Ok(bytes) if !bytes.is_empty() => {
                request = request.body(bytes);
            }
            Ok(_) => {}
            Err(err) => warn!("failed to read request body, forwarding without it: {err}"),
        }
    }

    let upstream = request.send().await.map_err(|err| {
        error!("backend request failed: {err}");
        GatewayError::BackendUnavailable {
            detail: err.to_string(),
        }
    })?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    let bytes = upstream.bytes().await.map_err(|err| {
        error!("failed to read backend response: {err}");
        GatewayError::BackendUnavailable {
            detail: err.to_string(),
        }
    })?;

    debug!("backend responded with {}", status);

    Ok((status, [(CONTENT_TYPE, content_type)], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use secrecy::SecretString;
    use url::Url;

    fn config(backend: &str) -> Result<GatewayConfig> {
        Ok(GatewayConfig::new(
            SecretString::from("p".to_string()),
            SecretString::from("s".to_string()),
            Url::parse(backend)?,
            SecretString::from("b".to_string()),
        ))
    }

    #[test]
    fn builds_url_with_default_prefix_and_query() -> Result<()> {
        let config = config("http://backend:3000")?;
        assert_eq!(
            upstream_url(&config, "fortress/status", Some("x=1")),
            "http://backend:3000/api/fortress/fortress/status?x=1"
        );
        assert_eq!(
            upstream_url(&config, "fortress/status", None),
            "http://backend:3000/api/fortress/fortress/status"
        );
        Ok(())
    }

    #[test]
    fn keeps_backend_base_path_and_raw_query() -> Result<()> {
        let config = config("https://backend.example/base/")?.with_backend_path_prefix("");
        assert_eq!(
            upstream_url(&config, "/a%20b/c", Some("q=a%20b&flag")),
            "https://backend.example/base/a%20b/c?q=a%20b&flag"
        );
        Ok(())
    }

    #[test]
    fn detects_dot_segments_in_any_encoding() {
        for path in [
            "/../internal",
            "/%2e%2e/%2e%2e/internal/admin",
            "/a/%2E%2e/b",
            "/.%2e/x",
            "/a/./b",
            "/a/%2e",
            "/a/..\\b",
        ] {
            assert!(has_dot_segment(path), "{path}");
        }
        for path in ["/fortress/status", "/a..b/c", "/.well-known/x", "/a/%2e%2ex", ""] {
            assert!(!has_dot_segment(path), "{path}");
        }
    }

    #[test]
    fn empty_query_is_dropped() -> Result<()> {
        let config = config("http://backend:3000")?;
        assert_eq!(
            upstream_url(&config, "status", Some("")),
            "http://backend:3000/api/fortress/status"
        );
        Ok(())
    }
}
