//! Login, logout and session probe endpoints.

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use super::{clear_session_cookie, client_source_id, extract_session_token, session_cookie};
use crate::rampart::{
    attempts::AttemptDecision,
    error::{GatewayError, retry_after_seconds},
    state::GatewayState,
};

/// Login bodies are tiny; anything larger is not a login.
const MAX_LOGIN_BODY_BYTES: usize = 16 * 1024;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    password: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SessionStatus {
    pub authenticated: bool,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[utoipa::path(
    post,
    path = "/auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Password accepted, session cookie set", body = SuccessResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Wrong password", body = ErrorResponse),
        (status = 429, description = "Too many attempts from this source", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all, fields(source_id = tracing::field::Empty))]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<GatewayState>>,
    body: Body,
) -> Result<Response, GatewayError> {
    let source_id = client_source_id(&headers);
    tracing::Span::current().record("source_id", source_id.as_str());

    // The attempt is counted before anything about the request is inspected.
    if let AttemptDecision::Limited { retry_after } =
        state.tracker().check_and_record(&source_id).await
    {
        warn!(
            "login rate limited, retry after {}s",
            retry_after_seconds(retry_after)
        );
        return Err(GatewayError::RateLimited { retry_after });
    }

    let bytes = to_bytes(body, MAX_LOGIN_BODY_BYTES).await.map_err(|err| {
        debug!("failed to read login body: {err}");
        GatewayError::BadRequest
    })?;

    let request: LoginRequest = serde_json::from_slice(&bytes).map_err(|err| {
        debug!("invalid login body: {err}");
        GatewayError::BadRequest
    })?;

    let expected = state.config().password().expose_secret().as_bytes();
    if !bool::from(request.password.as_bytes().ct_eq(expected)) {
        info!("login rejected: invalid password");
        return Err(GatewayError::InvalidPassword);
    }

    state.tracker().reset(&source_id).await;

    let token = state.codec().issue();
    let cookie = session_cookie(
        &token,
        state.codec().max_age(),
        state.config().cookie_secure(),
    )
    .map_err(|err| {
        error!("failed to build session cookie: {err}");
        GatewayError::Internal
    })?;

    info!("login accepted");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(SuccessResponse { success: true }),
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/auth",
    responses(
        (status = 200, description = "Session cookie cleared", body = SuccessResponse),
    ),
    tag = "auth"
)]
pub async fn logout(state: Extension<Arc<GatewayState>>) -> impl IntoResponse {
    let mut response_headers = HeaderMap::new();
    match clear_session_cookie(state.config().cookie_secure()) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("failed to build clearing cookie: {err}"),
    }

    (
        StatusCode::OK,
        response_headers,
        Json(SuccessResponse { success: true }),
    )
}

#[utoipa::path(
    get,
    path = "/auth",
    responses(
        (status = 200, description = "Session is valid", body = SessionStatus),
        (status = 401, description = "No valid session", body = SessionStatus),
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, state: Extension<Arc<GatewayState>>) -> impl IntoResponse {
    let authenticated =
        extract_session_token(&headers).is_some_and(|token| state.codec().verify(&token));

    let status = if authenticated {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };

    (status, Json(SessionStatus { authenticated }))
}
