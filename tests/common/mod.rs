#![allow(dead_code)]

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response},
};
use rampart::rampart::{
    clock::ManualClock,
    router,
    state::{GatewayConfig, GatewayState},
};
use secrecy::SecretString;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use url::Url;

pub const PASSWORD: &str = "correct horse battery staple";
pub const BACKEND_SECRET: &str = "fortress-shared-secret";
pub const START: Duration = Duration::from_secs(1_700_000_000);

pub struct Gateway {
    pub app: Router,
    pub state: Arc<GatewayState>,
    pub clock: Arc<ManualClock>,
}

pub fn config(backend_url: &str) -> Result<GatewayConfig> {
    Ok(GatewayConfig::new(
        SecretString::from(PASSWORD.to_string()),
        SecretString::from("integration-session-secret".to_string()),
        Url::parse(backend_url)?,
        SecretString::from(BACKEND_SECRET.to_string()),
    ))
}

pub fn gateway_with(config: GatewayConfig) -> Result<Gateway> {
    let clock = Arc::new(ManualClock::new(START));
    let state = Arc::new(GatewayState::with_clock(config, clock.clone())?);
    let app = router(state.clone());
    Ok(Gateway { app, state, clock })
}

pub fn gateway(backend_url: &str) -> Result<Gateway> {
    gateway_with(config(backend_url)?)
}

pub fn login_request(source: &str, body: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri("/auth")
        .header("content-type", "application/json")
        .header("x-forwarded-for", source)
        .body(Body::from(body.to_string()))?)
}

pub fn password_body(password: &str) -> String {
    serde_json::json!({ "password": password }).to_string()
}

pub fn session_cookie_header(token: &str) -> String {
    format!("rampart_session={token}")
}

pub async fn body_json(response: Response<Body>) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub async fn body_text(response: Response<Body>) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}
