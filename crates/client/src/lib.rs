//! Client core for the Spese expense tracker.
//!
//! Three pieces, wired leaf-first:
//!
//! - [`session`]: owns the authenticated principal and its lifecycle,
//!   backed by a pluggable [`session::IdentityProvider`].
//! - [`ledger`]: typed HTTP wrapper around the remote expense-ledger API,
//!   authenticating every request with the session's bearer token.
//! - [`sync`]: keeps a local cache of ledger entries and the
//!   server-computed summary consistent via refresh-after-write.
//!
//! The presentation layer consumes read-only snapshots and mutator
//! callbacks; nothing else crosses that boundary.

pub mod error;
pub mod ledger;
pub mod session;
pub mod sync;

pub use error::{
    AuthenticationError, ConfirmationError, LedgerError, RegistrationError, ResendError,
    SignOutError,
};
pub use session::{Session, SessionManager, SessionState};
pub use sync::{LedgerView, SyncController};
