//! Session ownership and the authentication state machine.
//!
//! [`SessionManager`] is the only writer of session state; everyone else
//! subscribes to a watch channel and reacts to changes. States move
//! `Uninitialized → Loading → {Authenticated | Anonymous}` on the first
//! check; afterwards `Authenticated → Anonymous` on successful sign-out
//! (a failed sign-out keeps the session) or when a re-check finds the
//! credentials no longer verify, and `Anonymous → Authenticated` only
//! through a successful sign-in followed by a successful check.

mod cache;
mod provider;
mod token;
mod user_pool;

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{
    AuthenticationError, ConfirmationError, RegistrationError, ResendError, SignOutError,
};

pub use cache::{CredentialCache, TokenSet};
pub use provider::{IdentityProvider, Principal, ProviderConfig, TokenSource};
pub use token::{IdToken, TokenClaims, TokenError, decode_claims};
pub use user_pool::UserPoolProvider;

/// The locally held representation of the authenticated principal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub identity_handle: String,
    pub email: Option<String>,
    pub subject_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Authenticated(Session),
    Anonymous,
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Owns the current session; at most one is held at a time and without
/// one every ledger operation is refused downstream.
pub struct SessionManager<P> {
    provider: Arc<P>,
    state: watch::Sender<SessionState>,
}

impl<P: IdentityProvider> SessionManager<P> {
    pub fn new(provider: P) -> Self {
        Self::with_shared(Arc::new(provider))
    }

    pub fn with_shared(provider: Arc<P>) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self { provider, state }
    }

    /// Handle to the provider, shared with the ledger client as its
    /// token source.
    pub fn provider(&self) -> Arc<P> {
        Arc::clone(&self.provider)
    }

    /// Change notifications for consumers; they read, never write.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    /// Resolves the current principal from the provider's cached
    /// credentials. Invoked once at startup and re-invocable at will;
    /// repeated checks with no intervening sign-in/out settle on the
    /// same answer. A failed resolution is the expected anonymous case
    /// and surfaces no error.
    pub async fn check_session(&self) -> Option<Session> {
        if *self.state.borrow() == SessionState::Uninitialized {
            self.publish(SessionState::Loading);
        }

        match self.provider.current_principal().await {
            Ok(principal) => {
                let session = Session {
                    identity_handle: principal.identity_handle,
                    email: principal.email,
                    subject_id: principal.subject_id,
                };
                self.publish(SessionState::Authenticated(session.clone()));
                Some(session)
            }
            Err(reason) => {
                tracing::debug!("session check resolved to anonymous: {reason}");
                self.publish(SessionState::Anonymous);
                None
            }
        }
    }

    /// Sign-in success carries no session data of its own; the session
    /// is materialized by the follow-up check.
    pub async fn sign_in(&self, handle: &str, secret: &str) -> Result<(), AuthenticationError> {
        self.provider.sign_in(handle, secret).await?;
        self.check_session().await;
        Ok(())
    }

    pub async fn sign_up(
        &self,
        handle: &str,
        email: &str,
        secret: &str,
    ) -> Result<(), RegistrationError> {
        self.provider.sign_up(handle, email, secret).await
    }

    pub async fn confirm_sign_up(&self, handle: &str, code: &str) -> Result<(), ConfirmationError> {
        self.provider.confirm_sign_up(handle, code).await
    }

    pub async fn resend_code(&self, handle: &str) -> Result<(), ResendError> {
        self.provider.resend_code(handle).await
    }

    /// On provider failure the local session is kept: showing signed-out
    /// while the provider still holds the session would be a lie.
    pub async fn sign_out(&self) -> Result<(), SignOutError> {
        self.provider.sign_out().await?;
        self.publish(SessionState::Anonymous);
        Ok(())
    }

    fn publish(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next.clone();
            true
        });
    }
}
