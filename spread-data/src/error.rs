use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `spread-data`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request rejected with 403 Forbidden, session invalidated")]
    Unauthorised,

    #[error("no authenticated session, login required")]
    NotAuthenticated,

    #[error("backend returned error code {code}: {message}")]
    Api { code: i64, message: String },

    #[error("failed to deserialise payload: {0}")]
    Deserialise(String),

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("session store failure: {0}")]
    Session(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse classification of a [`DataError`], used to decide how a view reacts to it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Request rejected, timed out, or the connection dropped. Surfaced as a status message.
    Transport,
    /// Credentials are missing or were rejected. Forces the logged-out state.
    Authorisation,
    /// A payload could not be decoded.
    Malformed,
    /// Local misconfiguration, invalid input, or session storage failure.
    Local,
}

impl DataError {
    /// Build a [`DataError`] from a non-success HTTP status and the response body.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::FORBIDDEN {
            return Self::Unauthorised;
        }

        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string()
        } else {
            body.chars().take(256).collect()
        };

        Self::Http {
            status: status.as_u16(),
            message,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::Transport(_) | DataError::Http { .. } | DataError::Socket(_) => {
                ErrorKind::Transport
            }
            DataError::Api { .. } => ErrorKind::Transport,
            DataError::Unauthorised | DataError::NotAuthenticated => ErrorKind::Authorisation,
            DataError::Deserialise(_) => ErrorKind::Malformed,
            DataError::Session(_) | DataError::Config(_) | DataError::InvalidInput(_) => {
                ErrorKind::Local
            }
        }
    }

    /// Determine if the error requires the user to log in again.
    pub fn requires_login(&self) -> bool {
        self.kind() == ErrorKind::Authorisation
    }

    /// Short status line suitable for display next to the chart.
    pub fn user_message(&self) -> String {
        match self {
            DataError::Unauthorised => "Permission denied, please log in again".to_string(),
            DataError::NotAuthenticated => "Not logged in".to_string(),
            DataError::Api { message, .. } if !message.is_empty() => message.clone(),
            DataError::Deserialise(_) => "Received malformed data".to_string(),
            DataError::InvalidInput(message) => message.clone(),
            DataError::Session(_) | DataError::Config(_) => self.to_string(),
            _ => "Failed to load data, please retry".to_string(),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(StatusCode::FORBIDDEN) => Self::Unauthorised,
            Some(status) => Self::Http {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None if error.is_decode() => Self::Deserialise(error.to_string()),
            None => Self::Transport(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(error: serde_json::Error) -> Self {
        Self::Deserialise(error.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DataError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(error.to_string())
    }
}

impl From<url::ParseError> for DataError {
    fn from(error: url::ParseError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<std::io::Error> for DataError {
    fn from(error: std::io::Error) -> Self {
        Self::Session(error.to_string())
    }
}
