//! Error types for supahack-core.

use thiserror::Error;

/// Result type alias using supahack-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for SupaHack operations
#[derive(Error, Debug)]
pub enum Error {
    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    // Connection errors
    #[error("{0}")]
    InvalidConnection(String),

    #[error("Project ID and apiKey required.")]
    MissingCredentials,

    // REST errors
    #[error("{}", format_request_failure(.context, *.status, .body))]
    Request {
        context: String,
        status: u16,
        body: String,
    },

    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // Browser host errors
    #[error("{0}")]
    Host(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a non-2xx REST response
    pub fn request(context: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Request {
            context: context.into(),
            status,
            body: body.into(),
        }
    }

    /// Create an error reported by the browser host
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    /// Whether the host rejected a call because it was not made in response
    /// to a direct user action.
    pub fn is_user_gesture_required(&self) -> bool {
        matches!(self, Self::Host(message) if message.to_ascii_lowercase().contains("user gesture"))
    }
}

fn format_request_failure(context: &str, status: u16, body: &str) -> String {
    if body.is_empty() {
        format!("{} ({})", context, status)
    } else {
        format!("{} ({}): {}", context, status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_message_includes_status_and_body() {
        let err = Error::request("OpenAPI request failed", 401, "Invalid API key");
        assert_eq!(err.to_string(), "OpenAPI request failed (401): Invalid API key");

        let err = Error::request("Count failed", 500, "");
        assert_eq!(err.to_string(), "Count failed (500)");
    }

    #[test]
    fn test_user_gesture_detection() {
        let err = Error::host("`sidePanel.open()` may only be called in response to a user gesture.");
        assert!(err.is_user_gesture_required());

        let err = Error::host("No tab with id: 7");
        assert!(!err.is_user_gesture_required());

        assert!(!Error::Other("user gesture".into()).is_user_gesture_required());
    }
}
