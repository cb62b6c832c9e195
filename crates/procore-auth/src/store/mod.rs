//! Credential persistence
//!
//! `CredentialStore` decouples the manager from where credential material
//! lives. Three implementations ship with the crate:
//! - `MemoryStore` for tests and short-lived processes
//! - `EncryptedFileStore` for a single encrypted file on disk
//! - `PlatformStore` for the OS keychain / credential manager

pub mod file;
pub mod memory;
pub mod platform;

pub use file::EncryptedFileStore;
pub use memory::MemoryStore;
pub use platform::PlatformStore;

use std::future::Future;
use std::pin::Pin;

use crate::credential::Credential;
use crate::error::{Error, Result};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Keyed credential persistence.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialStore>`). Dropping a returned future cancels the
/// operation; implementations never leave a partially written value behind.
///
/// - `get` returns `Ok(None)` when nothing is stored under `key`
/// - `store` is an upsert
/// - `delete` is idempotent
/// - an empty or whitespace-only key is `InvalidArgument` for all three
pub trait CredentialStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Credential>>;

    fn store<'a>(&'a self, key: &'a str, credential: Credential) -> StoreFuture<'a, ()>;

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Shared key check for every store implementation.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "storage key must not be empty".into(),
        ));
    }
    Ok(())
}
