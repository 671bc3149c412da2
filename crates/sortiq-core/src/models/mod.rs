//! Data models for SortIQ entities.
//!
//! - `User`, `Registration`, `SignInCredentials`: identity and auth payloads
//! - `ProcessedTask`, `TaskDetail`: SMART tasks before and after saving
//! - `Priority`, `TaskStatus`: task classification

pub mod task;
pub mod user;

pub use task::{
    EmailedTask, MessageResponse, Priority, ProcessedTask, TaskDetail, TaskResultEmail,
    TaskStatus, TransformRequest, TransformResponse,
};
pub use user::{
    ApiKeyUpdate, AuthResponse, RefreshRequest, RefreshResponse, Registration, SignInCredentials,
    User,
};
