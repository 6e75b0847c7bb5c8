//! Error types shared across the tutor controller.

use reqwest::StatusCode;
use thiserror::Error;

/// Message shown when the backend rejects a request with HTTP 429.
pub const RATE_LIMIT_MESSAGE: &str =
    "You've reached your limit of 50 messages. Please wait 24 hours before trying again.";

/// Failures while talking to the chat backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("rate limited by backend")]
    RateLimited,

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("no data received for {0} seconds")]
    Timeout(u64),
}

impl TransportError {
    /// HTTP status attached to this failure, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(e) => e.status(),
            TransportError::Timeout(_) => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(StatusCode::TOO_MANY_REQUESTS)
    }

    /// One-line text for the `addEvent` notification.
    pub fn user_message(&self) -> String {
        if self.is_rate_limited() {
            RATE_LIMIT_MESSAGE.to_string()
        } else {
            format!("[ERROR] {}", self)
        }
    }
}

#[derive(Debug, Error)]
pub enum TutorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("project catalog error: {0}")]
    Catalog(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("a request is still in progress")]
    Busy,
}

pub type TutorResult<T> = Result<T, TutorError>;
