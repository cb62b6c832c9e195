//! OS secure storage through the `keyring` crate
//!
//! macOS Keychain, Windows Credential Manager and the Linux kernel keyring.
//! Each storage key becomes one keyring entry (service = `procore-sdk`,
//! account = storage key) whose secret is the credential JSON. Keyring calls
//! are synchronous, so they run on the blocking pool.

use tracing::{debug, warn};

use super::{CredentialStore, StoreFuture, validate_key};
use crate::constants::KEYRING_SERVICE;
use crate::credential::Credential;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PlatformStore {
    service: String,
}

impl PlatformStore {
    /// Store under the default `procore-sdk` service.
    ///
    /// Fails with `PlatformUnsupported` on targets without a keyring backend.
    pub fn new() -> Result<Self> {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Result<Self> {
        if !native::SUPPORTED {
            return Err(Error::PlatformUnsupported(format!(
                "no secure credential storage on {}",
                std::env::consts::OS
            )));
        }
        Ok(Self {
            service: service.into(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Storage(format!("keyring task failed: {e}")))?
}

impl CredentialStore for PlatformStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Credential>> {
        Box::pin(async move {
            validate_key(key)?;
            let (service, account) = (self.service.clone(), key.to_string());
            let Some(json) = blocking(move || native::read(&service, &account)).await? else {
                return Ok(None);
            };
            match serde_json::from_str(&json) {
                Ok(credential) => Ok(Some(credential)),
                Err(e) => {
                    warn!(storage_key = key, error = %e, "keyring entry unreadable, treating as absent");
                    Ok(None)
                }
            }
        })
    }

    fn store<'a>(&'a self, key: &'a str, credential: Credential) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            validate_key(key)?;
            let json = serde_json::to_string(&credential)
                .map_err(|e| Error::Parse(format!("serializing credential: {e}")))?;
            let (service, account) = (self.service.clone(), key.to_string());
            blocking(move || native::write(&service, &account, &json)).await?;
            debug!(storage_key = key, service = %self.service, "stored credential in keyring");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            validate_key(key)?;
            let (service, account) = (self.service.clone(), key.to_string());
            blocking(move || native::remove(&service, &account)).await?;
            debug!(storage_key = key, service = %self.service, "deleted credential from keyring");
            Ok(())
        })
    }
}

#[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
mod native {
    use keyring::Entry;

    use crate::error::{Error, Result};

    pub const SUPPORTED: bool = true;

    fn entry(service: &str, account: &str) -> Result<Entry> {
        Entry::new(service, account)
            .map_err(|e| Error::Storage(format!("opening keyring entry {account}: {e}")))
    }

    pub fn read(service: &str, account: &str) -> Result<Option<String>> {
        match entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "reading keyring entry {account}: {e}"
            ))),
        }
    }

    pub fn write(service: &str, account: &str, secret: &str) -> Result<()> {
        entry(service, account)?
            .set_password(secret)
            .map_err(|e| Error::Storage(format!("writing keyring entry {account}: {e}")))
    }

    pub fn remove(service: &str, account: &str) -> Result<()> {
        match entry(service, account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "deleting keyring entry {account}: {e}"
            ))),
        }
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
mod native {
    use crate::error::{Error, Result};

    pub const SUPPORTED: bool = false;

    fn unsupported() -> Error {
        Error::PlatformUnsupported(std::env::consts::OS.to_string())
    }

    pub fn read(_service: &str, _account: &str) -> Result<Option<String>> {
        Err(unsupported())
    }

    pub fn write(_service: &str, _account: &str, _secret: &str) -> Result<()> {
        Err(unsupported())
    }

    pub fn remove(_service: &str, _account: &str) -> Result<()> {
        Err(unsupported())
    }
}
