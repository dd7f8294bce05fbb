use std::fmt::{Display, Formatter};

/// Error kinds surfaced by the persistence and entitlement core.
///
/// Every variant carries a human-readable message. `Validation` and
/// `NotFound` messages are safe to show verbatim; `Persistence` wraps
/// storage failures whose details belong in logs, not dialogs.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Persistence(String),
    InvalidApiKey(String),
}

impl AppError {
    pub fn is_invalid_api_key(&self) -> bool {
        matches!(self, AppError::InvalidApiKey(_))
    }

    /// Message suitable for direct display to the user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Persistence(_) => {
                "Something went wrong while accessing local storage. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "{}", msg),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Persistence(msg) => write!(f, "{}", msg),
            AppError::InvalidApiKey(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Persistence(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::Persistence(value.to_string())
    }
}

impl From<r2d2::Error> for AppError {
    fn from(value: r2d2::Error) -> Self {
        AppError::Persistence(format!("Failed to get connection from pool: {}", value))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::Persistence(value.to_string())
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(value: base64::DecodeError) -> Self {
        AppError::Validation(format!("Failed to decode base64: {}", value))
    }
}
