use thiserror::Error;

/// Input problems caught before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a client ID")]
    EmptyClientId,
    #[error("Please select at least one image")]
    NoFiles,
}

/// Per-file failure while talking to the analyze endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("HTTP error! Status: {status}")]
    Http { status: u16 },
    #[error("Invalid response format")]
    InvalidResponseFormat,
    #[error("No labels data received")]
    MissingLabels,
    #[error("Invalid label data: {0}")]
    MalformedLabels(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Could not read file: {0}")]
    Unreadable(String),
}

impl UploadError {
    /// Message shown in the error block; falls back when the cause has no text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(cause) if cause.trim().is_empty() => UNKNOWN_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";
pub const RETRY_HINT: &str = "Please try again or use a different image.";
