//! SortIQ core library.
//!
//! Session lifecycle and the authenticated request pipeline for the SortIQ
//! service, shared by every front end:
//!
//! - `auth`: the session store, stored credentials and session events
//! - `api`: the request pipeline with single-flight token renewal, plus typed endpoints
//! - `storage`: durable key-value backends for session material
//! - `models`: users, tasks and the payloads exchanged with the server
//! - `config`: user configuration and wiring

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthFailure, AuthOutcome, RestoreOutcome, SessionEvent, SessionStore};
pub use config::Config;
