//! Durable key-value storage for session material.
//!
//! The session store and the request pipeline only ever touch three string
//! keys (see [`StorageKeys`]), so storage is abstracted behind the small
//! [`KeyValueStore`] capability. Backends:
//!
//! - [`FileStore`]: a JSON map in the data directory
//! - [`KeyringStore`]: the OS keychain
//! - [`MemoryStore`]: in-process only (tests, ephemeral runs)

pub mod file;
pub mod keychain;
pub mod memory;

use thiserror::Error;

pub use self::file::FileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage data is corrupt: {0}")]
    Corrupt(String),

    #[error("Keychain error: {0}")]
    Keychain(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Names of the keys persisted for a session.
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived bearer token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Longer-lived token used to obtain a new access token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// JSON-serialized profile of the signed-in user
    pub const USER: &'static str = "user";

    /// Every key owned by a session, cleared as a unit.
    pub const ALL: [&'static str; 3] = [Self::ACCESS_TOKEN, Self::REFRESH_TOKEN, Self::USER];
}

/// Minimal storage capability. Writes are atomic per key and readers always
/// observe the latest committed value.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key. Returns whether a value was present.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
