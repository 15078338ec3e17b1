//! Failure taxonomy for the client core.
//!
//! Each session operation fails with its own error type so callers can
//! show differentiated messages; ledger operations share [`LedgerError`],
//! which keeps transport failures (retryable) apart from received HTTP
//! error responses (check your input).

use thiserror::Error;

/// Sign-in failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("account is not confirmed yet")]
    NotConfirmed,
    #[error("account is locked: {0}")]
    Lockout(String),
    #[error("identity provider unavailable: {0}")]
    Provider(String),
}

/// Registration failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("username is already taken")]
    DuplicateIdentity,
    #[error("password rejected: {0}")]
    WeakSecret(String),
    #[error("invalid registration field: {0}")]
    InvalidField(String),
    #[error("identity provider unavailable: {0}")]
    Provider(String),
}

/// Confirmation-code failures. The first three variants must stay
/// distinguishable for differentiated form messages.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfirmationError {
    #[error("verification code does not match")]
    CodeMismatch,
    #[error("verification code has expired")]
    CodeExpired,
    #[error("too many attempts, try again later")]
    RateLimited,
    #[error("identity provider unavailable: {0}")]
    Provider(String),
}

/// Code re-delivery failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResendError {
    #[error("unknown username")]
    UnknownIdentity,
    #[error("account is already confirmed")]
    AlreadyConfirmed,
    #[error("identity provider unavailable: {0}")]
    Provider(String),
}

/// Sign-out failures. On this error the local session is retained so the
/// UI never shows signed-out while the provider still holds the session.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignOutError {
    #[error("identity provider unavailable: {0}")]
    Provider(String),
}

/// Why passive session resolution produced no principal. Expected
/// steady-state, logged but never surfaced to callers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("no cached credentials")]
    NoCredentials,
    #[error("cached credentials expired")]
    Expired,
    #[error("identity provider unavailable: {0}")]
    Provider(String),
}

/// Ledger operation failures.
///
/// `Network` is a transport-level failure (DNS, refused connection,
/// timeout, undecodable body): the request may never have reached the
/// server, so callers offer a manual retry and nothing is auto-retried.
/// `Fetch` means the server answered with a non-success status.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("network error: {0}")]
    Network(String),
    #[error("{status}: {message}")]
    Fetch { status: u16, message: String },
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Errors from the on-disk credential cache.
#[derive(Debug, Error)]
pub enum CredentialCacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
