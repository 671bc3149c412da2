use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::models::User;

/// Session transitions observers may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: i64 },
    SignedOut,
    /// The access token was renewed; carries the profile if the server sent one
    Refreshed { user: Option<User> },
    /// Renewal failed and the session was torn down. The user has to sign in again.
    Expired,
}

pub type SessionEventCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Fan-out of session events to registered callbacks.
///
/// Callbacks run synchronously on the emitting task, outside the registry lock.
#[derive(Clone, Default)]
pub struct SessionEvents {
    listeners: Arc<Mutex<Vec<SessionEventCallback>>>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.lock().push(Arc::new(callback));
    }

    pub fn emit(&self, event: SessionEvent) {
        debug!(event = ?event, "Session event");
        let listeners = self.lock().clone();
        for listener in listeners {
            listener(&event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SessionEventCallback>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}
