//! Authenticated session state.
//!
//! The session is the pair (user, token). Both are set together by
//! [`SessionStore::set_auth`] and cleared together by [`SessionStore::logout`];
//! every change is written through to storage and mirrored into the shared
//! [`AuthHeader`] so outgoing requests carry the credential.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::AuthHeader;
use crate::error::ClientError;
use crate::storage::{KeyValueStore, StorageError, AUTH_TOKEN_KEY, AUTH_USER_KEY};

/// The authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Snapshot of the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

pub struct SessionStore {
    state: RwLock<Session>,
    storage: Arc<dyn KeyValueStore>,
    auth_header: AuthHeader,
}

impl SessionStore {
    /// A logged-out store that ignores anything already in storage
    pub fn new(storage: Arc<dyn KeyValueStore>, auth_header: AuthHeader) -> Self {
        Self {
            state: RwLock::new(Session::default()),
            storage,
            auth_header,
        }
    }

    /// Restore the session persisted by a previous run.
    ///
    /// Only a complete session is restored: a stored user with a non-empty
    /// stored token. Anything less leaves the store logged out.
    pub fn hydrate(
        storage: Arc<dyn KeyValueStore>,
        auth_header: AuthHeader,
    ) -> Result<Self, ClientError> {
        let store = Self::new(storage, auth_header);

        let stored_user = store.storage.get(AUTH_USER_KEY)?;
        let stored_token = store.storage.get(AUTH_TOKEN_KEY)?;

        let (Some(raw_user), Some(token)) = (stored_user, stored_token) else {
            return Ok(store);
        };
        if token.is_empty() {
            return Ok(store);
        }

        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => {
                info!(user_id = %user.id, "Restored session");
                store.set_auth(user, token)?;
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable stored user");
            }
        }

        Ok(store)
    }

    /// Set user and token together, persist both and propagate the credential.
    ///
    /// An empty token (registration returns none) clears the default header.
    pub fn set_auth(&self, user: User, token: impl Into<String>) -> Result<(), ClientError> {
        let token = token.into();
        let header = if token.is_empty() {
            None
        } else {
            Some(AuthHeader::bearer_value(&token)?)
        };
        let encoded_user = serde_json::to_string(&user).map_err(|source| StorageError::Encode {
            key: AUTH_USER_KEY.to_string(),
            source,
        })?;

        if let Err(e) = self.persist(&encoded_user, &token) {
            self.discard_stored();
            return Err(e.into());
        }

        {
            let mut state = self.state.write();
            state.user = Some(user);
            state.token = Some(token);
        }

        match header {
            Some(value) => self.auth_header.install(value),
            None => self.auth_header.clear(),
        }
        Ok(())
    }

    /// Write the pair; the old token goes first so no write order can pair it with the new user
    fn persist(&self, encoded_user: &str, token: &str) -> Result<(), StorageError> {
        self.storage.remove(AUTH_TOKEN_KEY)?;
        self.storage.set(AUTH_USER_KEY, encoded_user)?;
        self.storage.set(AUTH_TOKEN_KEY, token)
    }

    /// Leave storage empty after a partial write; hydration then finds no session
    fn discard_stored(&self) {
        for key in [AUTH_TOKEN_KEY, AUTH_USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to discard partially stored session");
            }
        }
    }

    /// Clear the session, its stored keys and the default header
    pub fn logout(&self) -> Result<(), ClientError> {
        let previous = {
            let mut state = self.state.write();
            std::mem::take(&mut *state)
        };
        self.auth_header.clear();

        self.storage.remove(AUTH_USER_KEY)?;
        self.storage.remove(AUTH_TOKEN_KEY)?;

        if let Some(user) = previous.user {
            info!(user_id = %user.id, "Logged out");
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.read().is_logged_in()
    }

    /// Whether a non-empty credential is available for authenticated calls
    pub fn has_credential(&self) -> bool {
        self.state
            .read()
            .token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}
