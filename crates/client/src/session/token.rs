//! Decode-only handling of the provider's id tokens.
//!
//! Tokens are consumed as bearer credentials and for claim extraction;
//! signature verification is the identity provider's concern, not ours.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not a three-part JWT")]
    Malformed,
    #[error("token payload is not valid base64url")]
    Encoding,
    #[error("token payload is not valid claims JSON: {0}")]
    Claims(String),
}

/// Claims the client cares about; everything else in the payload is
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Stable subject identifier, the ledger's ownership key.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "cognito:username")]
    pub username: Option<String>,
    /// Expiry as seconds since the epoch; absent means never expires.
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// The principal's login handle, falling back to the subject id when
    /// the provider does not embed a username claim.
    pub fn handle(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.sub)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => now.timestamp() >= exp,
            None => false,
        }
    }
}

/// A raw id token together with its decoded claims. The raw string is
/// what goes into `Authorization: Bearer`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdToken {
    pub raw: String,
    pub claims: TokenClaims,
}

impl IdToken {
    pub fn decode(raw: impl Into<String>) -> Result<Self, TokenError> {
        let raw = raw.into();
        let claims = decode_claims(&raw)?;
        Ok(Self { raw, claims })
    }
}

/// Extracts the claims from the payload segment of a JWT.
pub fn decode_claims(raw: &str) -> Result<TokenClaims, TokenError> {
    let mut parts = raw.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(TokenError::Malformed),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Encoding)?;
    serde_json::from_slice(&bytes).map_err(|err| TokenError::Claims(err.to_string()))
}
