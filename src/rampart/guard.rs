//! Session gate in front of every proxied route.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{error::GatewayError, handlers::extract_session_token, state::GatewayState};

/// Let the request through only with a valid session cookie.
pub async fn require_session(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = extract_session_token(request.headers())
        .is_some_and(|token| state.codec().verify(&token));

    if !authorized {
        debug!("rejected request without a valid session");
        return GatewayError::Unauthorized.into_response();
    }

    next.run(request).await
}
