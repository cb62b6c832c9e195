//! Login tool error types

use thiserror::Error;

/// Failures specific to the interactive login flow.
///
/// Library errors (token endpoint, storage) keep their own types and are
/// wrapped with context by `anyhow` in `main`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("usage: {0}")]
    Usage(String),

    #[error("authorization response state does not match the request")]
    StateMismatch,

    #[error("authorization denied: {0}")]
    Denied(String),

    #[error("authorization response did not include a code")]
    MissingCode,

    #[error("timed out waiting for the authorization callback")]
    CallbackTimeout,

    #[error("callback listener failed: {0}")]
    Listener(String),

    #[error("login cancelled")]
    Cancelled,
}

/// Result alias using the login Error
pub type Result<T> = std::result::Result<T, Error>;
