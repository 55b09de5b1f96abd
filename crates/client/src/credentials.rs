//! Credential Store.
//!
//! Holds the current session (credential + identity) in process and mirrors
//! it to a [`KeyValueStore`] under one fixed key. The whole session is a
//! single value, so readers always see both tokens from the same write.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use adminconsole_auth::{AuthenticatedIdentity, Credential, CredentialError, Grants};

use crate::store::KeyValueStore;

/// Everything persisted for the logged-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub credential: Credential,
    #[serde(default)]
    pub identity: Option<AuthenticatedIdentity>,
}

impl Session {
    pub fn new(credential: Credential, identity: AuthenticatedIdentity) -> Self {
        Self {
            credential,
            identity: Some(identity),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.credential.is_empty()
    }
}

#[derive(Debug)]
pub struct CredentialStore {
    key: String,
    backend: Arc<dyn KeyValueStore>,
    session: RwLock<Session>,
    // Serializes writes to the backend so they land in mutation order.
    write_lock: tokio::sync::Mutex<()>,
}

impl CredentialStore {
    pub fn new(key: impl Into<String>, backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            key: key.into(),
            backend,
            session: RwLock::new(Session::default()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current credential, or [`Credential::empty`] when logged out.
    pub fn get(&self) -> Credential {
        self.read().credential.clone()
    }

    pub fn identity(&self) -> Option<AuthenticatedIdentity> {
        self.read().identity.clone()
    }

    /// Granted permissions and roles of the current session.
    pub fn grants(&self) -> Grants {
        self.read()
            .identity
            .as_ref()
            .map(|identity| identity.grants.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    /// Read the persisted session, if any.
    ///
    /// A stored record that fails to parse, or whose credential is only half
    /// populated, is removed from the backend and reported as absent. The
    /// in-process session is left untouched; the caller installs the result.
    pub async fn load(&self) -> anyhow::Result<Option<Session>> {
        let raw = self.backend.get(&self.key).await?;
        let session = match raw {
            Some(value) => match serde_json::from_value::<Session>(value) {
                Ok(session) => session,
                Err(err) => {
                    tracing::warn!(key = %self.key, error = %err, "discarding unreadable session record");
                    self.backend.remove(&self.key).await?;
                    return Ok(None);
                }
            },
            None => return Ok(None),
        };

        if session.credential.is_empty() {
            return Ok(None);
        }
        if session.credential.refresh_token().is_none() {
            tracing::warn!(key = %self.key, error = %CredentialError::Partial, "discarding stored session");
            self.backend.remove(&self.key).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Full replace of the session (login).
    pub(crate) fn replace(&self, session: Session) {
        *self.write() = session;
    }

    /// Swap in a renewed credential, keeping the identity.
    pub(crate) fn update_credential(&self, credential: Credential) {
        self.write().credential = credential;
    }

    /// Full clear (logout or failed refresh).
    pub(crate) fn clear(&self) {
        *self.write() = Session::default();
    }

    /// Write the current session through to the backend.
    ///
    /// The in-process view stays authoritative; a failed write is logged and
    /// otherwise ignored.
    pub(crate) async fn persist(&self) {
        let _guard = self.write_lock.lock().await;
        let session = self.snapshot();

        let outcome = if session.is_empty() {
            self.backend.remove(&self.key).await
        } else {
            match serde_json::to_value(&session) {
                Ok(value) => self.backend.set(&self.key, value, None).await,
                Err(err) => Err(err.into()),
            }
        };

        if let Err(err) = outcome {
            tracing::error!(key = %self.key, error = %err, "failed to persist session");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}
