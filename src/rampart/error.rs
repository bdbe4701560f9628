//! Error shapes returned by the gateway's own endpoints.
//!
//! Backend errors are never mapped here: upstream 4xx/5xx responses are relayed
//! untouched. Only a failure to reach the backend becomes `BackendUnavailable`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request")]
    BadRequest,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Too many login attempts, try again later")]
    RateLimited { retry_after: Duration },
    #[error("Backend unavailable")]
    BackendUnavailable { detail: String },
    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::InvalidPassword | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Whole seconds a client should wait, never zero while still limited.
pub(crate) fn retry_after_seconds(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match self {
            Self::RateLimited { retry_after } => {
                let seconds = retry_after_seconds(retry_after);
                let mut response = (status, Json(json!({ "error": message }))).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(seconds));
                response
            }
            Self::BackendUnavailable { detail } => (
                status,
                Json(json!({ "error": message, "detail": detail })),
            )
                .into_response(),
            _ => (status, Json(json!({ "error": message }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[test]
    fn status_mapping() {
        assert_eq!(GatewayError::BadRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::InvalidPassword.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(GatewayError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::RateLimited {
                retry_after: Duration::from_secs(1)
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GatewayError::BackendUnavailable {
                detail: String::new()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn retry_after_rounds_up_partial_seconds() {
        assert_eq!(retry_after_seconds(Duration::from_secs(890)), 890);
        assert_eq!(retry_after_seconds(Duration::from_millis(889_500)), 890);
        assert_eq!(retry_after_seconds(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after_header() -> Result<()> {
        let response = GatewayError::RateLimited {
            retry_after: Duration::from_secs(890),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok()),
            Some("890")
        );
        let body = body_json(response).await?;
        assert!(body["error"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn backend_unavailable_includes_detail() -> Result<()> {
        let response = GatewayError::BackendUnavailable {
            detail: "connection refused".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await?;
        assert_eq!(body["error"], "Backend unavailable");
        assert_eq!(body["detail"], "connection refused");
        Ok(())
    }

    #[tokio::test]
    async fn bad_request_is_generic() -> Result<()> {
        let body = body_json(GatewayError::BadRequest.into_response()).await?;
        assert_eq!(body, json!({ "error": "Invalid request" }));
        Ok(())
    }
}
