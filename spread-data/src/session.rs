//! Authenticated session, passed by reference into every gateway that needs a bearer token.
//!
//! A session holds [`Credentials`] from login until logout or until the backend rejects the
//! token, at which point the credentials (and the persisted copy, if any) are dropped.

use crate::{error::DataError, gateway::user::User};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, path::PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub current_user: Option<User>,
}

#[derive(Debug, Default)]
pub struct Session {
    credentials: RwLock<Option<Credentials>>,
    path: Option<PathBuf>,
}

impl Session {
    /// Logged-out session, persisted to `path` once logged in.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            credentials: RwLock::new(None),
            path,
        }
    }

    /// Restore the session persisted at `path`. A missing file yields a logged-out session.
    pub fn load(path: PathBuf) -> Result<Self, DataError> {
        let credentials = match std::fs::read_to_string(&path) {
            Ok(contents) => Some(serde_json::from_str::<Credentials>(&contents).map_err(
                |error| DataError::Session(format!("{}: {error}", path.display())),
            )?),
            Err(error) if error.kind() == ErrorKind::NotFound => None,
            Err(error) => return Err(error.into()),
        };

        debug!(path = %path.display(), restored = credentials.is_some(), "loaded session");

        Ok(Self {
            credentials: RwLock::new(credentials),
            path: Some(path),
        })
    }

    /// Start a session for `username`, replacing any existing one.
    pub fn login(
        &self,
        token: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<(), DataError> {
        let credentials = Credentials {
            token: token.into(),
            username: username.into(),
            current_user: None,
        };
        info!(username = %credentials.username, "session started");

        *self.credentials.write() = Some(credentials);
        self.persist()
    }

    /// End the session and delete any persisted copy.
    pub fn logout(&self) -> Result<(), DataError> {
        if let Some(credentials) = self.credentials.write().take() {
            info!(username = %credentials.username, "session ended");
        }

        match &self.path {
            Some(path) => match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
                Err(error) => Err(error.into()),
            },
            None => Ok(()),
        }
    }

    /// Drop the session after the backend rejected its token.
    pub fn invalidate(&self) {
        warn!("session token rejected, logging out");
        if let Err(error) = self.logout() {
            warn!(%error, "failed to delete persisted session");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.read().is_some()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.credentials
            .read()
            .as_ref()
            .map(|credentials| credentials.token.clone())
    }

    pub fn username(&self) -> Option<String> {
        self.credentials
            .read()
            .as_ref()
            .map(|credentials| credentials.username.clone())
    }

    pub fn current_user(&self) -> Option<User> {
        self.credentials
            .read()
            .as_ref()
            .and_then(|credentials| credentials.current_user.clone())
    }

    /// Cache the backend's record of the logged-in user. Ignored when logged out.
    pub fn set_current_user(&self, user: Option<User>) -> Result<(), DataError> {
        match self.credentials.write().as_mut() {
            Some(credentials) => credentials.current_user = user,
            None => return Ok(()),
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), DataError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let Some(credentials) = self.credentials() else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&credentials)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
