//! Error types for the supahack CLI.

use thiserror::Error;

/// Errors raised by the CLI itself (as opposed to the core library).
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No connection. Pass --project-id and --api-key, set SUPAHACK_PROJECT_ID / SUPAHACK_API_KEY, or save one with `supahack connect`.")]
    NoConnection,

    #[error("Invalid assignment '{0}', expected column=value")]
    InvalidAssignment(String),

    #[error("No captured request at index {0}")]
    NoSuchCapture(usize),
}

impl From<toml::de::Error> for CliError {
    fn from(e: toml::de::Error) -> Self {
        CliError::Config(e.to_string())
    }
}
