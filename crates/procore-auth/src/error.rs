//! Error types for credential lifecycle operations

/// Errors from OAuth and credential storage operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Transport-level failure reaching the authorization server.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The token endpoint answered with a non-2xx status.
    #[error("token endpoint returned {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("secure storage error: {0}")]
    Storage(String),

    #[error("platform not supported: {0}")]
    PlatformUnsupported(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Network failures and non-2xx responses from the authorization server.
    pub fn is_http_failure(&self) -> bool {
        matches!(self, Error::Http(_) | Error::HttpStatus { .. })
    }

    /// Status code carried by an `HttpStatus` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
