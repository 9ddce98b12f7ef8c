//! Signed, short-lived identity tokens.
//!
//! A token is `base64url(user_id "." expires_at) "." hex(hmac_sha256(payload))`.
//! The storefront issues one after a successful upstream login and requires it
//! on every checkout route; a user id supplied by the browser is never trusted
//! on its own.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const MAX_TTL_SECS: u64 = 365 * 86_400;

/// A caller whose token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token expired at {0}")]
    Expired(DateTime<Utc>),
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }

    pub fn issue(&self, user_id: &str, now: DateTime<Utc>) -> String {
        let expires_at = now + self.ttl;
        let payload = URL_SAFE_NO_PAD.encode(format!("{user_id}.{}", expires_at.timestamp()));
        let signature = hex::encode(self.mac(payload.as_bytes()).finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AuthenticatedUser, IdentityError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(IdentityError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| IdentityError::Malformed)?;
        self.mac(payload.as_bytes())
            .verify_slice(&signature)
            .map_err(|_| IdentityError::BadSignature)?;

        let decoded = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| IdentityError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| IdentityError::Malformed)?;
        let (user_id, expires) = decoded.rsplit_once('.').ok_or(IdentityError::Malformed)?;
        if user_id.is_empty() {
            return Err(IdentityError::Malformed);
        }
        let expires_at = expires
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(IdentityError::Malformed)?;
        if expires_at <= now {
            return Err(IdentityError::Expired(expires_at));
        }

        Ok(AuthenticatedUser {
            user_id: user_id.to_string(),
            expires_at,
        })
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(payload);
        mac
    }
}

/// Pull the token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
