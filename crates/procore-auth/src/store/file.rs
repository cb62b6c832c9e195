//! Encrypted single-file credential store
//!
//! The file holds a JSON map of storage key → credential, sealed with
//! AES-256-GCM. Layout on disk is `nonce (12 bytes) || ciphertext`. The
//! cipher key is SHA-256 over the caller's key material followed by the file
//! path, so the same passphrase yields different keys for different files.
//!
//! All writes use atomic temp-file + rename and a tokio Mutex serializes
//! read-modify-write cycles within one store. Temp files carry a random
//! suffix, so separate stores on the same path never share one; their
//! updates to the map are last-writer-wins.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngExt;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CredentialStore, StoreFuture, validate_key};
use crate::credential::Credential;
use crate::error::{Error, Result};

const NONCE_SIZE: usize = 12;

type CredentialMap = HashMap<String, Credential>;

pub struct EncryptedFileStore {
    path: PathBuf,
    cipher: Aes256Gcm,
    lock: Mutex<()>,
}

impl EncryptedFileStore {
    /// Open (lazily) the store at `path`. Nothing touches the disk until the
    /// first operation.
    pub fn new(path: impl Into<PathBuf>, key_material: &[u8]) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument(
                "credential file path must not be empty".into(),
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(key_material);
        hasher.update(path.to_string_lossy().as_bytes());
        let key = hasher.finalize();
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| Error::Storage(format!("initializing cipher: {e}")))?;

        Ok(Self {
            path,
            cipher,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and decrypt the whole map.
    ///
    /// A missing file is an empty map. So is a file that fails to decrypt or
    /// parse: the next write replaces it.
    async fn read_map(&self) -> Result<CredentialMap> {
        let sealed = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CredentialMap::new()),
            Err(e) => return Err(Error::Io(format!("reading credential file: {e}"))),
        };

        let plaintext = match self.decrypt(&sealed) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "credential file unreadable, treating as empty");
                return Ok(CredentialMap::new());
            }
        };

        match serde_json::from_slice(&plaintext) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "credential file corrupt, treating as empty");
                Ok(CredentialMap::new())
            }
        }
    }

    /// Persist the map, or remove the file once the map is empty.
    async fn write_map(&self, map: &CredentialMap) -> Result<()> {
        if map.is_empty() {
            return match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), "removed empty credential file");
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Io(format!("removing credential file: {e}"))),
            };
        }

        let json = serde_json::to_vec(map)
            .map_err(|e| Error::Parse(format!("serializing credentials: {e}")))?;
        let sealed = self.encrypt(&json)?;
        write_atomic(&self.path, &sealed).await
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| Error::Storage(format!("encrypting credentials: {e}")))?;
        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE {
            return Err(Error::Storage("ciphertext is too short".into()));
        }
        let (nonce_bytes, payload) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|e| Error::Storage(format!("decrypting credentials: {e}")))
    }
}

impl CredentialStore for EncryptedFileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Credential>> {
        Box::pin(async move {
            validate_key(key)?;
            let _guard = self.lock.lock().await;
            let mut map = self.read_map().await?;
            Ok(map.remove(key))
        })
    }

    fn store<'a>(&'a self, key: &'a str, credential: Credential) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            validate_key(key)?;
            let _guard = self.lock.lock().await;
            let mut map = self.read_map().await?;
            map.insert(key.to_string(), credential);
            self.write_map(&map).await?;
            debug!(storage_key = key, path = %self.path.display(), "stored credential");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            validate_key(key)?;
            let _guard = self.lock.lock().await;
            let mut map = self.read_map().await?;
            if map.remove(key).is_some() {
                self.write_map(&map).await?;
                debug!(storage_key = key, path = %self.path.display(), "deleted credential");
            }
            Ok(())
        })
    }
}

/// Write bytes to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Missing parent directories are created. Sets file permissions
/// to 0600 (owner read/write only) since the file contains OAuth tokens.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("credential path has no file name".into()))?
        .to_string_lossy();

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;

    let mut suffix = [0u8; 8];
    rand::rng().fill(&mut suffix);
    let tmp_path = dir.join(format!(
        ".{file_name}.tmp.{}.{:016x}",
        std::process::id(),
        u64::from_le_bytes(suffix)
    ));

    tokio::fs::write(&tmp_path, data)
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::Io(format!("renaming temp credential file: {e}")));
    }

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
