use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by [`super::ApiClient`].
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP status {status}: {}", .message.as_deref().unwrap_or("no message from server"))]
    Status {
        status: StatusCode,
        /// The server's own `message`/`error` field, when the body carried one.
        message: Option<String>,
    },
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HttpError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// Message supplied by the server, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            HttpError::Status {
                message: Some(message),
                ..
            } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}
