//! In-process credential store backed by a concurrent map

use dashmap::DashMap;
use tracing::debug;

use super::{CredentialStore, StoreFuture, validate_key};
use crate::credential::Credential;

/// Volatile store; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Credential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Credential>> {
        Box::pin(async move {
            validate_key(key)?;
            Ok(self.entries.get(key).map(|entry| entry.value().clone()))
        })
    }

    fn store<'a>(&'a self, key: &'a str, credential: Credential) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            validate_key(key)?;
            self.entries.insert(key.to_string(), credential);
            debug!(storage_key = key, "stored credential in memory");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            validate_key(key)?;
            if self.entries.remove(key).is_some() {
                debug!(storage_key = key, "removed credential from memory");
            }
            Ok(())
        })
    }
}
