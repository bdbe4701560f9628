//! Session token codec.
//!
//! A token is `<issued_at>.<hex(HMAC-SHA256(issued_at))>`, where `issued_at` is the
//! Unix time in seconds as decimal text. Nothing is stored server side: a token is
//! valid until it is older than `max_age` or the secret changes.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;

use super::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("session secret must not be empty")]
    EmptySecret,
    #[error("session secret is not a usable HMAC key")]
    InvalidKey,
}

#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
    max_age: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("mac", &"***")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// Build a codec keyed with `secret`.
    ///
    /// # Errors
    /// Returns an error if the secret is empty.
    pub fn new(
        secret: &SecretString,
        max_age: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let key = secret.expose_secret();
        if key.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| TokenError::InvalidKey)?;
        Ok(Self {
            mac,
            max_age,
            clock,
        })
    }

    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Mint a token stamped with the current time.
    #[must_use]
    pub fn issue(&self) -> String {
        let issued_at = self.clock.now().as_secs().to_string();
        let signature = self.sign(&issued_at);
        format!("{issued_at}.{signature}")
    }

    /// Check shape, age and signature. Never panics on garbage input.
    #[must_use]
    pub fn verify(&self, token: &str) -> bool {
        let mut parts = token.split('.');
        let (Some(issued_at), Some(signature), None) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        let Ok(issued_at_secs) = issued_at.parse::<u64>() else {
            return false;
        };

        let age = self.clock.now().as_secs().saturating_sub(issued_at_secs);
        if age > self.max_age.as_secs() {
            return false;
        }

        let expected = self.sign(issued_at);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
