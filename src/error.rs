//! Error types
//!
//! Two layers: [`RemoteError`] is whatever a [`crate::remote::RemoteClient`]
//! or a draft reports about the backend, [`Error`] is what the cache engine
//! hands back to its callers.

use thiserror::Error;

/// Maximum number of characters of a backend message kept in an error
const MAX_MESSAGE_LENGTH: usize = 200;

/// Faults raised by a remote client or a draft's remote action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("API request failed: {code} {message}")]
    Status { code: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Operation not supported by the remote client: {0}")]
    Unsupported(&'static str),
}

impl RemoteError {
    /// Build a status error, truncating and sanitizing the backend message
    pub fn status(code: u16, message: impl AsRef<str>) -> Self {
        Self::Status {
            code,
            message: sanitize_message(message.as_ref()),
        }
    }

    /// HTTP status code carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Format the error for display to a user
    /// Security: generic messages avoid leaking API structure details
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { code: 403, .. } => {
                "Permission denied. Check your access rights on the target resource.".to_string()
            }
            Self::Status { code: 401, .. } => {
                "Authentication failed. Sign in again and retry.".to_string()
            }
            Self::Status { code: 404, .. } => "Resource not found.".to_string(),
            Self::Status { code: 409, .. } => {
                "Resource conflict. The resource may already exist or be in use.".to_string()
            }
            Self::Status { code: 429, .. } => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            Self::Status { code: 400, .. } => "Invalid request. Check your parameters.".to_string(),
            Self::Status { code, .. } if *code >= 500 => {
                "Cloud service temporarily unavailable. Please try again.".to_string()
            }
            Self::Status { .. } | Self::Transport(_) => {
                "Request failed. Check your network connection and try again.".to_string()
            }
            Self::Decode(_) => "Unexpected response from the cloud service.".to_string(),
            Self::Unsupported(op) => format!("Operation '{}' is not supported here.", op),
        }
    }
}

/// Errors surfaced by modules and resources
#[derive(Error, Debug)]
pub enum Error {
    #[error("resource \"{name}\" already exists")]
    AlreadyExists { name: String },

    #[error("resource \"{name}\" doesn't exist")]
    DoesNotExist { name: String },

    #[error("{operation} is not supported for {type_name}")]
    Unsupported {
        operation: &'static str,
        type_name: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("owning {0} is no longer available")]
    ParentGone(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    /// The remote fault wrapped by this error, if it came from the backend
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }

    /// Format the error for display to a user
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Truncate long messages and drop control characters (newlines included)
fn sanitize_message(message: &str) -> String {
    let cleaned: String = message
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    if cleaned.chars().count() > MAX_MESSAGE_LENGTH {
        let truncated: String = cleaned.chars().take(MAX_MESSAGE_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", truncated, message.len())
    } else {
        cleaned
    }
}
