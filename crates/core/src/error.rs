use pdf_engine::{EngineError, ErrorKind};

/// Errors reported by a [`DocumentSession`](crate::DocumentSession).
///
/// The `Display` text is what hosts receive in the `Error` event.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Wrong or missing password; reloading with the right one recovers
    #[error("Password required or incorrect password.")]
    Authentication,

    /// The source is not a readable PDF
    #[error("Document is not a valid PDF: {0}")]
    Format(String),

    /// The source could not be reached
    #[error("Could not load PDF: {0}")]
    Io(String),

    /// A load was requested before any source was configured
    #[error("No document source set.")]
    NoSource,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err.kind() {
            ErrorKind::Authentication => Self::Authentication,
            ErrorKind::Format => Self::Format(err.to_string()),
            ErrorKind::Io => Self::Io(err.to_string()),
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Invalid configuration input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration key or environment variable
    #[error("Invalid value for configuration key: {0}")]
    InvalidValue(String),
}
