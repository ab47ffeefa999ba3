//! Bearer access token.
//!
//! The backend issues HS256 JWTs carrying an `exp` claim. The client never
//! verifies the signature; it only reads `exp` so a stale persisted session
//! is discarded instead of replayed.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// An access token plus its decoded expiry.
#[derive(Clone)]
pub struct AccessToken {
    secret: SecretString,
    expires_at: Option<i64>,
}

impl AccessToken {
    /// Wrap a raw token string, reading `exp` when the token is a JWT.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw: String = raw.into();
        let expires_at = decode_exp(&raw);
        Self {
            secret: SecretString::from(raw),
            expires_at,
        }
    }

    /// The raw token, for the `Authorization` header and the session file.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    /// Expiry from the JWT `exp` claim; `None` for opaque tokens.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Tokens without a readable `exp` are treated as live; the backend will
    /// answer 401 if they are not.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now.timestamp() >= exp)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn decode_exp(raw: &str) -> Option<i64> {
    let payload = raw.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok()?.exp
}
