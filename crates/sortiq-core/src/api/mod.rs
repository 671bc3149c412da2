//! REST API client module for the SortIQ service.
//!
//! `ApiClient` is the single egress point for calls to the remote API. It
//! attaches the stored bearer token to every call and transparently renews
//! an expired token once (see `client`). Typed endpoint calls live in
//! `endpoints`; the wire itself sits behind the `Transport` trait.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport, TransportError};
