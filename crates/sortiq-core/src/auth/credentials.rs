use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::models::User;
use crate::storage::{KeyValueStore, StorageError, StorageKeys, StorageResult};

/// Access token plus, once the server has issued one, a refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Typed view over durable storage for session material.
///
/// This is the only writer of the credential keys; the request pipeline reads
/// the access token through it on every call.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.store.get(StorageKeys::ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.store.get(StorageKeys::REFRESH_TOKEN)
    }

    /// The stored credential, if an access token is present.
    pub fn credential(&self) -> StorageResult<Option<Credential>> {
        let Some(access_token) = self.access_token()? else {
            return Ok(None);
        };
        Ok(Some(Credential {
            access_token,
            refresh_token: self.refresh_token()?,
        }))
    }

    /// Replace the stored credential. A missing refresh token removes any
    /// previously stored one.
    pub fn store_credential(&self, credential: &Credential) -> StorageResult<()> {
        self.store
            .set(StorageKeys::ACCESS_TOKEN, &credential.access_token)?;
        match credential.refresh_token {
            Some(ref refresh) => self.store.set(StorageKeys::REFRESH_TOKEN, refresh)?,
            None => {
                self.store.remove(StorageKeys::REFRESH_TOKEN)?;
            }
        }
        Ok(())
    }

    /// Store renewed tokens. A missing refresh token keeps the current one.
    pub fn update_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> StorageResult<()> {
        self.store.set(StorageKeys::ACCESS_TOKEN, access_token)?;
        if let Some(refresh) = refresh_token {
            self.store.set(StorageKeys::REFRESH_TOKEN, refresh)?;
        }
        Ok(())
    }

    /// The cached profile. Unparseable data is reported as corrupt.
    pub fn user(&self) -> StorageResult<Option<User>> {
        match self.store.get(StorageKeys::USER)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StorageError::Corrupt(format!("cached user: {}", e))),
            None => Ok(None),
        }
    }

    pub fn store_user(&self, user: &User) -> StorageResult<()> {
        let json =
            serde_json::to_string(user).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        self.store.set(StorageKeys::USER, &json)
    }

    /// Remove every session key. All keys are attempted even if one fails;
    /// the first failure is returned.
    pub fn clear(&self) -> StorageResult<()> {
        let mut first_error = None;
        for key in StorageKeys::ALL {
            if let Err(e) = self.store.remove(key) {
                warn!(key = key, error = %e, "Failed to remove session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Check if an access token is stored
    pub fn has_credentials(&self) -> bool {
        self.store.has(StorageKeys::ACCESS_TOKEN).unwrap_or(false)
    }
}
