use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{AuthResponse, Registration, SignInCredentials, User};

use super::credentials::{Credential, CredentialStore};
use super::events::SessionEvent;

/// Shown when sign-in is attempted with an empty field
const MISSING_SIGN_IN_FIELDS: &str = "Email and password are required";

/// Shown when a verification link carried no token
const MISSING_VERIFICATION_TOKEN: &str = "No verification token provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// An operation is in progress
    #[default]
    Loading,
    Ready,
}

/// Snapshot of who is signed in and with what.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub credential: Option<Credential>,
    pub user: Option<User>,
    pub status: SessionStatus,
    /// Message of the last failed operation
    pub error: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Result of [`SessionStore::restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing was stored
    NoSession,
    /// The stored credential was accepted
    Restored(User),
    /// The server rejected the stored credential; storage was wiped
    Invalidated,
    /// Validation could not complete; the stored credential was kept
    Preserved { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected locally, nothing was sent
    Validation,
    /// The server refused the request content
    Rejected,
    Unauthorized,
    Network,
    Storage,
}

/// Why a session operation failed, with a message fit for display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl AuthFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ApiError> for AuthFailure {
    fn from(e: ApiError) -> Self {
        let kind = match e {
            ApiError::Validation(_) => FailureKind::Validation,
            ApiError::Unauthorized(_) | ApiError::RefreshFailed(_) => FailureKind::Unauthorized,
            ApiError::Network(_) => FailureKind::Network,
            ApiError::Storage(_) => FailureKind::Storage,
            _ => FailureKind::Rejected,
        };
        Self::new(kind, e.user_message())
    }
}

/// Outcome of sign-up, sign-in and verification: the signed-in user, or why not.
pub type AuthOutcome = Result<User, AuthFailure>;

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    status: SessionStatus,
    error: Option<String>,
}

/// Single authority for who is signed in and which credential proves it.
///
/// Operations never panic and never hand raw transport errors to callers;
/// they return an [`AuthOutcome`] and record the last error on the session.
pub struct SessionStore {
    client: ApiClient,
    credentials: CredentialStore,
    state: Arc<RwLock<SessionState>>,
}

impl SessionStore {
    pub fn new(client: ApiClient) -> Self {
        let credentials = client.credentials().clone();
        let state = Arc::new(RwLock::new(SessionState::default()));

        // Keep the in-memory identity in step with renewals done by the pipeline
        let listener_state = Arc::clone(&state);
        client.events().subscribe(move |event| match event {
            SessionEvent::Expired => {
                let mut state = write_state(&listener_state);
                state.user = None;
                state.status = SessionStatus::Ready;
                state.error = Some("Your session has expired. Please sign in again.".to_string());
            }
            SessionEvent::Refreshed { user: Some(user) } => {
                write_state(&listener_state).user = Some(user.clone());
            }
            _ => {}
        });

        Self {
            client,
            credentials,
            state,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    // ===== Derived state =====

    pub fn is_authenticated(&self) -> bool {
        read_state(&self.state).user.is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        read_state(&self.state).user.clone()
    }

    pub fn status(&self) -> SessionStatus {
        read_state(&self.state).status
    }

    pub fn last_error(&self) -> Option<String> {
        read_state(&self.state).error.clone()
    }

    /// The stored credential, read from durable storage so a renewal is
    /// always reflected.
    pub fn credential(&self) -> Option<Credential> {
        self.credentials.credential().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stored credential");
            None
        })
    }

    /// Snapshot of the session. The credential is read from durable storage,
    /// which is always current even after a renewal.
    pub fn session(&self) -> Session {
        let credential = self.credential();
        let state = read_state(&self.state);
        Session {
            credential,
            user: state.user.clone(),
            status: state.status,
            error: state.error.clone(),
        }
    }

    // ===== Operations =====

    /// Restore a session saved by a previous run. Call once at startup.
    ///
    /// Only an authorization failure invalidates the stored session; any other
    /// failure keeps it, since a flaky network must not sign the user out.
    pub async fn restore(&self) -> RestoreOutcome {
        self.begin();

        let has_token = match self.credentials.access_token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential");
                self.finish(None, Some(e.to_string()));
                return RestoreOutcome::NoSession;
            }
        };
        if !has_token {
            info!("No saved session found");
            self.finish(None, None);
            return RestoreOutcome::NoSession;
        }

        info!("Validating saved session");
        match self.client.current_user().await {
            Ok(user) => {
                if let Err(e) = self.credentials.store_user(&user) {
                    warn!(error = %e, "Failed to cache user profile");
                }
                info!(user_id = user.id, "Session restored");
                self.finish(Some(user.clone()), None);
                self.client.events().emit(SessionEvent::SignedIn { user_id: user.id });
                RestoreOutcome::Restored(user)
            }
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "Saved session rejected, clearing it");
                if let Err(e) = self.credentials.clear() {
                    warn!(error = %e, "Failed to clear stored session");
                }
                self.finish(None, None);
                RestoreOutcome::Invalidated
            }
            Err(e) => {
                warn!(error = %e, "Could not validate saved session, keeping it");
                let cached = self.credentials.user().unwrap_or_else(|e| {
                    warn!(error = %e, "Ignoring unreadable cached profile");
                    None
                });
                let message = e.user_message();
                self.finish(cached, Some(message.clone()));
                RestoreOutcome::Preserved { error: message }
            }
        }
    }

    pub async fn sign_up(&self, registration: &Registration) -> AuthOutcome {
        let missing = registration.missing_fields();
        if !missing.is_empty() {
            return self.fail(AuthFailure::new(
                FailureKind::Validation,
                format!("Missing required fields: {}", missing.join(", ")),
            ));
        }

        self.begin();
        match self.client.sign_up(registration).await {
            Ok(response) => self.establish(response),
            Err(e) => self.fail(e.into()),
        }
    }

    /// Sign in with email and password. Empty fields fail without a request.
    pub async fn sign_in(&self, credentials: &SignInCredentials) -> AuthOutcome {
        if !credentials.is_complete() {
            return self.fail(AuthFailure::new(
                FailureKind::Validation,
                MISSING_SIGN_IN_FIELDS,
            ));
        }

        self.begin();
        let request = SignInCredentials::new(credentials.email.trim(), credentials.password.clone());
        match self.client.sign_in(&request).await {
            Ok(response) => self.establish(response),
            Err(e) => self.fail(e.into()),
        }
    }

    /// Forget the session: memory and durable storage both.
    pub fn sign_out(&self) {
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        {
            let mut state = write_state(&self.state);
            state.user = None;
            state.status = SessionStatus::Ready;
            state.error = None;
        }
        info!("Signed out");
        self.client.events().emit(SessionEvent::SignedOut);
    }

    /// Sign in with the token from an email verification link. The token acts
    /// as an access token; there is no refresh token until the next sign-in.
    pub async fn verify_and_login(&self, token: &str) -> AuthOutcome {
        let token = token.trim();
        if token.is_empty() {
            return self.fail(AuthFailure::new(
                FailureKind::Validation,
                MISSING_VERIFICATION_TOKEN,
            ));
        }

        self.begin();
        if let Err(e) = self
            .credentials
            .store_credential(&Credential::new(token, None))
        {
            return self.fail(AuthFailure::new(FailureKind::Storage, e.to_string()));
        }

        match self.client.current_user().await {
            Ok(user) => {
                if let Err(e) = self.credentials.store_user(&user) {
                    return self.fail(AuthFailure::new(FailureKind::Storage, e.to_string()));
                }
                info!(user_id = user.id, "Email verified, signed in");
                self.finish(Some(user.clone()), None);
                self.client.events().emit(SessionEvent::SignedIn { user_id: user.id });
                Ok(user)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    if let Err(e) = self.credentials.clear() {
                        warn!(error = %e, "Failed to clear rejected verification token");
                    }
                }
                self.fail(e.into())
            }
        }
    }

    // ===== Internals =====

    fn establish(&self, response: AuthResponse) -> AuthOutcome {
        let credential = Credential::new(response.access_token, response.refresh_token);
        let stored = self
            .credentials
            .store_credential(&credential)
            .and_then(|_| self.credentials.store_user(&response.user));
        if let Err(e) = stored {
            return self.fail(AuthFailure::new(FailureKind::Storage, e.to_string()));
        }

        let user = response.user;
        info!(user_id = user.id, "Signed in");
        self.finish(Some(user.clone()), None);
        self.client.events().emit(SessionEvent::SignedIn { user_id: user.id });
        Ok(user)
    }

    fn begin(&self) {
        let mut state = write_state(&self.state);
        state.status = SessionStatus::Loading;
        state.error = None;
    }

    fn finish(&self, user: Option<User>, error: Option<String>) {
        let mut state = write_state(&self.state);
        state.user = user;
        state.status = SessionStatus::Ready;
        state.error = error;
    }

    /// Record a failure without touching the current identity.
    fn fail(&self, failure: AuthFailure) -> AuthOutcome {
        warn!(kind = ?failure.kind, error = %failure.message, "Session operation failed");
        let mut state = write_state(&self.state);
        state.status = SessionStatus::Ready;
        state.error = Some(failure.message.clone());
        Err(failure)
    }
}

fn read_state(state: &RwLock<SessionState>) -> RwLockReadGuard<'_, SessionState> {
    state.read().unwrap_or_else(|e| e.into_inner())
}

fn write_state(state: &RwLock<SessionState>) -> RwLockWriteGuard<'_, SessionState> {
    state.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::api::client::{LOGIN_PATH, ME_PATH, REFRESH_PATH, SIGNUP_PATH};
    use crate::api::transport::mock::{self, MockTransport};
    use crate::storage::{KeyValueStore, MemoryStore, StorageKeys};

    fn user_json() -> serde_json::Value {
        json!({ "id": 42, "username": "ada", "email": "ada@example.com", "full_name": "Ada", "is_active": true })
    }

    fn store_with(transport: Arc<MockTransport>, storage: Arc<MemoryStore>) -> SessionStore {
        let client = ApiClient::new(transport, CredentialStore::new(storage));
        SessionStore::new(client)
    }

    fn seeded(access: &str, refresh: Option<&str>) -> Arc<MemoryStore> {
        let storage = Arc::new(MemoryStore::new());
        storage.set(StorageKeys::ACCESS_TOKEN, access).unwrap();
        if let Some(refresh) = refresh {
            storage.set(StorageKeys::REFRESH_TOKEN, refresh).unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_restore_without_saved_session() {
        let transport = MockTransport::new(|_| mock::json(200, user_json()));
        let store = store_with(transport.clone(), Arc::new(MemoryStore::new()));

        assert_eq!(store.status(), SessionStatus::Loading);
        assert_eq!(store.restore().await, RestoreOutcome::NoSession);
        assert!(!store.is_authenticated());
        assert_eq!(store.status(), SessionStatus::Ready);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_restore_accepted_session() {
        let transport = MockTransport::new(|req| {
            if req.bearer.as_deref() == Some("A0") {
                mock::json(200, user_json())
            } else {
                mock::unauthorized()
            }
        });
        let storage = seeded("A0", Some("R0"));
        let store = store_with(transport.clone(), storage.clone());

        let user = match store.restore().await {
            RestoreOutcome::Restored(user) => user,
            other => panic!("expected a restored session, got {:?}", other),
        };
        assert_eq!(user.id, 42);
        assert!(store.is_authenticated());
        assert_eq!(store.current_user(), Some(user));
        assert_eq!(transport.requests()[0].path, ME_PATH);
        // Profile is mirrored for the next offline start
        assert!(storage.get(StorageKeys::USER).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restore_rejected_session_wipes_storage() {
        let transport = MockTransport::new(|_| mock::unauthorized());
        let storage = seeded("A0", None);
        storage.set(StorageKeys::USER, &user_json().to_string()).unwrap();
        let store = store_with(transport, storage.clone());

        assert_eq!(store.restore().await, RestoreOutcome::Invalidated);
        assert!(!store.is_authenticated());
        assert!(store.session().credential.is_none());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_restore_rejected_even_after_failed_renewal() {
        let transport = MockTransport::new(|req| match req.path.as_str() {
            REFRESH_PATH => mock::json(401, json!({ "detail": "Invalid credentials" })),
            _ => mock::unauthorized(),
        });
        let storage = seeded("A0", Some("R0"));
        let store = store_with(transport.clone(), storage.clone());

        assert_eq!(store.restore().await, RestoreOutcome::Invalidated);
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_restore_renews_expired_access_token() {
        let transport = MockTransport::new(|req| match (req.path.as_str(), req.bearer.as_deref()) {
            (REFRESH_PATH, _) => mock::json(200, json!({ "access_token": "A1", "refresh_token": "R1" })),
            (_, Some("A1")) => mock::json(200, user_json()),
            _ => mock::unauthorized(),
        });
        let storage = seeded("A0", Some("R0"));
        let store = store_with(transport, storage.clone());

        assert!(matches!(store.restore().await, RestoreOutcome::Restored(_)));
        let credential = store.session().credential.unwrap();
        assert_eq!(credential.access_token, "A1");
        assert_eq!(credential.refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_restore_offline_keeps_credential() {
        let transport = MockTransport::new(|_| mock::offline());
        let storage = seeded("A0", Some("R0"));
        let store = store_with(transport, storage.clone());

        let outcome = store.restore().await;
        assert!(matches!(outcome, RestoreOutcome::Preserved { .. }));
        let credential = store.session().credential.unwrap();
        assert_eq!(credential.access_token, "A0");
        assert_eq!(credential.refresh_token.as_deref(), Some("R0"));
        assert_eq!(store.last_error().as_deref(), Some("Unable to reach the server"));
    }

    #[tokio::test]
    async fn test_restore_rejected_with_unreachable_renewal_wipes_storage() {
        let transport = MockTransport::new(|req| match req.path.as_str() {
            REFRESH_PATH => mock::offline(),
            _ => mock::unauthorized(),
        });
        let storage = seeded("A0", Some("R0"));
        let store = store_with(transport.clone(), storage.clone());

        assert_eq!(store.restore().await, RestoreOutcome::Invalidated);
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert!(storage.is_empty());
        assert!(store.credential().is_none());
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_credential_tracks_storage() {
        let transport = MockTransport::new(|req| match (req.path.as_str(), req.bearer.as_deref()) {
            (REFRESH_PATH, _) => mock::json(200, json!({ "access_token": "A1" })),
            (_, Some("A1")) => mock::json(200, user_json()),
            _ => mock::unauthorized(),
        });
        let store = store_with(transport, seeded("A0", Some("R0")));
        assert_eq!(store.credential().unwrap().access_token, "A0");

        store.restore().await;
        let credential = store.credential().unwrap();
        assert_eq!(credential.access_token, "A1");
        assert_eq!(credential.refresh_token.as_deref(), Some("R0"));

        store.sign_out();
        assert!(store.credential().is_none());
    }

    #[tokio::test]
    async fn test_restore_offline_uses_cached_profile() {
        let transport = MockTransport::new(|_| mock::json(503, json!({ "detail": "maintenance" })));
        let storage = seeded("A0", Some("R0"));
        storage.set(StorageKeys::USER, &user_json().to_string()).unwrap();
        let store = store_with(transport, storage);

        assert_eq!(
            store.restore().await,
            RestoreOutcome::Preserved { error: "maintenance".to_string() }
        );
        assert!(store.is_authenticated());
        assert_eq!(store.current_user().unwrap().id, 42);
    }

    #[tokio::test]
    async fn test_sign_in_with_empty_email_sends_nothing() {
        let transport = MockTransport::new(|_| mock::json(200, json!({})));
        let store = store_with(transport.clone(), Arc::new(MemoryStore::new()));

        let err = store
            .sign_in(&SignInCredentials::new("", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Validation);
        assert_eq!(err.message, "Email and password are required");
        assert_eq!(store.last_error().as_deref(), Some("Email and password are required"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_stores_session() {
        let transport = MockTransport::new(|_| {
            mock::json(200, json!({ "user": user_json(), "access_token": "A0", "refresh_token": "R0", "token_type": "bearer" }))
        });
        let storage = Arc::new(MemoryStore::new());
        let store = store_with(transport.clone(), storage.clone());

        let user = store
            .sign_in(&SignInCredentials::new(" ada@example.com ", "pw"))
            .await
            .unwrap();
        assert_eq!(user.username, "ada");
        assert!(store.is_authenticated());
        assert_eq!(store.status(), SessionStatus::Ready);
        assert_eq!(storage.get(StorageKeys::ACCESS_TOKEN).unwrap().as_deref(), Some("A0"));
        assert_eq!(storage.get(StorageKeys::REFRESH_TOKEN).unwrap().as_deref(), Some("R0"));
        assert!(storage.get(StorageKeys::USER).unwrap().is_some());

        let request = &transport.requests()[0];
        assert_eq!(request.path, LOGIN_PATH);
        assert!(request.bearer.is_none());
        assert_eq!(
            request.body,
            Some(json!({ "email": "ada@example.com", "password": "pw" }))
        );
    }

    #[tokio::test]
    async fn test_sign_in_bad_password_does_not_renew() {
        let transport = MockTransport::new(|_| mock::json(401, json!({ "detail": "Invalid credentials" })));
        let storage = seeded("OLD", Some("R-OLD"));
        let store = store_with(transport.clone(), storage);

        let err = store
            .sign_in(&SignInCredentials::new("ada@example.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Unauthorized);
        assert_eq!(err.message, "Invalid credentials");
        assert_eq!(transport.count(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn test_sign_up_validation_errors_are_flattened() {
        let transport = MockTransport::new(|_| {
            mock::json(422, json!({ "detail": [
                { "loc": ["body", "email"], "msg": "value is not a valid email address" }
            ]}))
        });
        let store = store_with(transport, Arc::new(MemoryStore::new()));

        let registration = Registration {
            email: "nope".to_string(),
            username: "ada".to_string(),
            password: "pw".to_string(),
            full_name: None,
        };
        let err = store.sign_up(&registration).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Rejected);
        assert_eq!(err.message, "body.email - value is not a valid email address");
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_up_without_refresh_token() {
        let transport = MockTransport::new(|_| {
            mock::json(200, json!({ "user": user_json(), "access_token": "A0" }))
        });
        let storage = seeded("STALE", Some("R-STALE"));
        let store = store_with(transport.clone(), storage.clone());

        let registration = Registration {
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password: "pw".to_string(),
            full_name: Some("Ada".to_string()),
        };
        store.sign_up(&registration).await.unwrap();
        assert_eq!(transport.requests()[0].path, SIGNUP_PATH);
        assert_eq!(storage.get(StorageKeys::ACCESS_TOKEN).unwrap().as_deref(), Some("A0"));
        assert_eq!(storage.get(StorageKeys::REFRESH_TOKEN).unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_up_missing_fields() {
        let transport = MockTransport::new(|_| mock::json(200, json!({})));
        let store = store_with(transport.clone(), Arc::new(MemoryStore::new()));

        let err = store.sign_up(&Registration::default()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Validation);
        assert_eq!(err.message, "Missing required fields: email, username, password");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let transport = MockTransport::new(|_| mock::json(200, user_json()));
        let storage = seeded("A0", Some("R0"));
        let store = store_with(transport, storage.clone());
        store.restore().await;
        assert!(store.is_authenticated());
        assert_eq!(storage.len(), 3);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        store.client().events().subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        store.sign_out();
        assert!(!store.is_authenticated());
        for key in StorageKeys::ALL {
            assert_eq!(storage.get(key).unwrap(), None);
        }
        assert_eq!(*events.lock().unwrap(), vec![SessionEvent::SignedOut]);
    }

    #[tokio::test]
    async fn test_requests_after_sign_out_carry_no_token() {
        let transport = MockTransport::new(|_| mock::json(200, json!([])));
        let store = store_with(transport.clone(), seeded("A0", Some("R0")));

        store.sign_out();
        store.client().list_tasks().await.unwrap();
        assert!(transport.requests()[0].bearer.is_none());
    }

    #[tokio::test]
    async fn test_verify_and_login() {
        let transport = MockTransport::new(|req| {
            if req.bearer.as_deref() == Some("verify-token") {
                mock::json(200, user_json())
            } else {
                mock::unauthorized()
            }
        });
        let storage = seeded("OLD", Some("R-OLD"));
        let store = store_with(transport.clone(), storage.clone());

        let user = store.verify_and_login("verify-token").await.unwrap();
        assert_eq!(user.id, 42);
        assert!(store.is_authenticated());
        assert_eq!(
            storage.get(StorageKeys::ACCESS_TOKEN).unwrap().as_deref(),
            Some("verify-token")
        );
        // No refresh token exists yet for this credential
        assert_eq!(storage.get(StorageKeys::REFRESH_TOKEN).unwrap(), None);
        assert_eq!(transport.requests()[0].path, ME_PATH);
    }

    #[tokio::test]
    async fn test_verify_with_rejected_token() {
        let transport = MockTransport::new(|_| mock::unauthorized());
        let storage = Arc::new(MemoryStore::new());
        let store = store_with(transport.clone(), storage.clone());

        let err = store.verify_and_login("expired").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Unauthorized);
        assert!(storage.is_empty());
        assert!(!store.is_authenticated());
        // Without a refresh token there is nothing to renew with
        assert_eq!(transport.count(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn test_verify_without_token() {
        let transport = MockTransport::new(|_| mock::json(200, user_json()));
        let store = store_with(transport.clone(), Arc::new(MemoryStore::new()));

        let err = store.verify_and_login("  ").await.unwrap_err();
        assert_eq!(err.message, "No verification token provided");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_expired_renewal_clears_identity() {
        let transport = MockTransport::new(|req| match (req.path.as_str(), req.bearer.as_deref()) {
            (ME_PATH, Some("A0")) => mock::json(200, user_json()),
            (REFRESH_PATH, _) => mock::json(401, json!({ "detail": "Invalid credentials" })),
            _ => mock::unauthorized(),
        });
        let storage = seeded("A0", Some("R0"));
        let store = store_with(transport, storage.clone());
        store.restore().await;
        assert!(store.is_authenticated());

        let err = store.client().list_tasks().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!store.is_authenticated());
        assert!(storage.is_empty());
        assert!(store.last_error().is_some());
    }
}
