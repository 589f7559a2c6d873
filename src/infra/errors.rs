// src/infra/errors.rs — Error types for Manifix

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifixError {
    // Caller errors (reported before any session exists)
    #[error("Input rejected: {0}")]
    InputRejected(String),

    #[error("Session '{id}' not found")]
    SessionNotFound { id: String },

    #[error("Unsupported format '{format}'. Supported: {supported}")]
    UnsupportedFormat { format: String, supported: String },

    // External tools
    #[error("Could not start '{program}': {message}")]
    ToolSpawn { program: String, message: String },

    #[error("'{program}' timed out after {seconds}s")]
    ToolTimeout { program: String, seconds: u64 },

    #[error("{0}")]
    Conversion(String),

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ManifixError {
    pub fn not_found(id: &str) -> Self {
        ManifixError::SessionNotFound { id: id.to_string() }
    }

    /// Errors the caller caused (bad upload, bad format). Everything else is ours.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ManifixError::InputRejected(_)
                | ManifixError::UnsupportedFormat { .. }
                | ManifixError::Conversion(_)
        )
    }
}
