use keyring::Entry;

use super::{KeyValueStore, StorageError, StorageResult};

/// Default keychain service name
pub const DEFAULT_SERVICE_NAME: &str = "sortiq";

/// OS keychain store. Each key is one keychain entry under a shared service.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> StorageResult<Entry> {
        Entry::new(&self.service, key)
            .map_err(|e| StorageError::Keychain(format!("Failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Keychain(format!(
                "Failed to read {} from keychain: {}",
                key, e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entry(key)?.set_password(value).map_err(|e| {
            StorageError::Keychain(format!("Failed to store {} in keychain: {}", key, e))
        })
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(StorageError::Keychain(format!(
                "Failed to delete {} from keychain: {}",
                key, e
            ))),
        }
    }
}
