//! Authenticated HTTP pipeline for the Procore SDK
//!
//! Defines the `Transport` trait that decouples request sending from
//! authentication. `ReqwestTransport` sends requests as-is; `AuthInterceptor`
//! wraps any transport with credential injection and a single
//! refresh-and-retry on 401. Interceptors are transports themselves, so they
//! compose.

pub mod interceptor;
pub mod transport;

pub use interceptor::AuthInterceptor;
pub use transport::ReqwestTransport;

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

/// Errors surfaced to the caller of a `Transport`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying send failed (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// A retry was required but the request body could not be cloned.
    #[error("request cannot be replayed: {0}")]
    ReplayFailed(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("request cancelled")]
    Cancelled,
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed future returned by `Transport::send`.
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<reqwest::Response>> + Send + 'a>>;

/// Sends one HTTP request.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Box<dyn Transport>`). Implementations must give up with
/// `Error::Cancelled` once `cancel` fires.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: reqwest::Request,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a>;
}
