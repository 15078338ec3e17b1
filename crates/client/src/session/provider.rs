//! The identity-provider boundary.
//!
//! Any provider offering these operations is substitutable; the shipped
//! implementation is [`super::UserPoolProvider`], tests use in-memory
//! fakes.

use crate::error::{
    AuthenticationError, ConfirmationError, PrincipalError, RegistrationError, ResendError,
    SignOutError,
};

use super::token::IdToken;

/// Explicitly constructed provider configuration, held by whoever builds
/// the provider. Never a process-wide singleton, so tests can run
/// isolated instances side by side.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Base URL of the user-pool endpoint.
    pub endpoint: String,
    /// Public client identifier registered with the pool.
    pub client_id: String,
}

/// The principal the provider currently vouches for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub identity_handle: String,
    pub subject_id: String,
    pub email: Option<String>,
}

/// Source of the current bearer token; the seam shared by the session
/// manager and the ledger client.
#[allow(async_fn_in_trait)]
pub trait TokenSource: Send + Sync {
    /// The current id token, refreshed if the provider supports it.
    /// `None` when no valid token is available.
    async fn id_token(&self) -> Option<IdToken>;
}

/// Capability interface over the external identity provider.
///
/// Credential issuance and validation are delegated entirely; the client
/// never sees a password after handing it over.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider: TokenSource {
    /// Resolves the principal from the provider's cached credentials,
    /// refreshing them when possible. Failure here is expected
    /// steady-state (nobody signed in yet, tokens expired).
    async fn current_principal(&self) -> Result<Principal, PrincipalError>;

    async fn sign_in(&self, handle: &str, secret: &str) -> Result<(), AuthenticationError>;

    /// Registers a new principal. Most pools require a separate
    /// confirmation step, so this never establishes a session.
    async fn sign_up(
        &self,
        handle: &str,
        email: &str,
        secret: &str,
    ) -> Result<(), RegistrationError>;

    async fn confirm_sign_up(&self, handle: &str, code: &str) -> Result<(), ConfirmationError>;

    async fn resend_code(&self, handle: &str) -> Result<(), ResendError>;

    /// Ends the provider-side session and discards local credentials.
    /// On failure local credentials must be kept.
    async fn sign_out(&self) -> Result<(), SignOutError>;
}
