//! Session management for the signed-in user.
//!
//! This module provides:
//! - `SessionStore`: restore, sign-up, sign-in, sign-out and email verification
//! - `CredentialStore`: durable storage of the token pair and cached profile
//! - `SessionEvents`: notifications when a session starts, renews or ends
//!
//! An access token that expires mid-session is renewed by the request
//! pipeline in `api::client`; a failed renewal emits `SessionEvent::Expired`.

pub mod credentials;
pub mod events;
pub mod session;

pub use credentials::{Credential, CredentialStore};
pub use events::{SessionEvent, SessionEventCallback, SessionEvents};
pub use session::{
    AuthFailure, AuthOutcome, FailureKind, RestoreOutcome, Session, SessionStatus, SessionStore,
};
