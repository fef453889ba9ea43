//! Common error types for drivekit.

use thiserror::Error;

/// Top-level error type for drivekit operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input provided. Raised before any remote call is made.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Local I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// OAuth2 flow or token handling failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote call failed (transport or unexpected API status).
    #[error("Network error: {0}")]
    Network(String),

    /// Remote resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote service denied access.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An underlying error annotated with a short static prefix.
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with a short description of the failed step.
    pub fn context(self, context: &'static str) -> Self {
        Error::Context {
            context,
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error was raised by argument validation.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self.root(), Error::InvalidInput(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
