use crate::storage::StorageError;
use http::StatusCode;
use thiserror::Error;

const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection and try again.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl From<http::Error> for ClientError {
    fn from(e: http::Error) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl ClientError {
    /// Status code carried by the error, if the server produced one.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// Text suitable for showing to the person using the app.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(e) => {
                tracing::warn!(error = %e, "Network error");
                NETWORK_ERROR_MESSAGE.to_string()
            }
            Self::Api { status, message } => {
                tracing::debug!(status = %status, message = %message, "API error");
                message.clone()
            }
            Self::Unauthorized | Self::NotLoggedIn => {
                tracing::debug!("Session is not authenticated");
                "Your session has expired. Please log in again.".to_string()
            }
            Self::Decode(e) => {
                tracing::error!(error = %e, "Unexpected response format");
                "Unexpected response from server.".to_string()
            }
            Self::InvalidRequest(msg) => {
                tracing::error!(message = %msg, "Invalid request");
                "Something went wrong. Please try again.".to_string()
            }
            Self::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                "Could not access local storage.".to_string()
            }
        }
    }
}
