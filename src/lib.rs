//! # Rampart (operator gateway)
//!
//! `rampart` sits in front of a control-plane backend and is the only thing the
//! operator's browser talks to. It does three jobs:
//!
//! 1. **Login:** checks the operator password and hands out a signed session
//!    token (`<issued_at>.<hmac>`) as an `HttpOnly` cookie.
//! 2. **Brute-force defense:** every login attempt is counted per source address
//!    in a sliding window; once the cap is hit the source gets `429` until the
//!    window runs out.
//! 3. **Proxy:** authenticated requests under `/proxy/*` are relayed verbatim to
//!    the backend with a shared secret header the browser never sees.
//!
//! All state is in memory. Restarting the process forgets attempt history, and
//! rotating the session secret logs every operator out.

pub mod cli;
pub mod rampart;

pub mod built_info {
    #![allow(clippy::doc_markdown)]
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
