//! Procore OAuth 2.0 credential lifecycle
//!
//! Provides PKCE login, token refresh with single-flight coalescing, and
//! pluggable credential persistence. The crate has no dependency on any HTTP
//! pipeline; `procore-http` layers request interception on top of it.
//!
//! Credential flow:
//! 1. `PkceFlow::authorization_request()` builds the browser URL + verifier
//! 2. The user authorizes; the redirect carries an authorization code
//! 3. `PkceFlow::exchange_code()` trades the code for a `Credential`
//! 4. `CredentialManager::store_credential()` persists it
//! 5. `CredentialManager::get_credential()` refreshes it near expiry
//! 6. Each refresh is broadcast as a `CredentialRefreshedEvent`

pub mod cancel;
pub mod constants;
pub mod credential;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod options;
pub mod pkce;
pub mod store;
pub mod token;

pub use constants::*;
pub use credential::{Credential, CredentialRefreshedEvent, CredentialStatus};
pub use error::{Error, Result};
pub use manager::CredentialManager;
pub use options::AuthOptions;
pub use pkce::{AuthorizationRequest, PkceFlow, compute_challenge, generate_verifier};
pub use store::{CredentialStore, EncryptedFileStore, MemoryStore, PlatformStore};
pub use token::TokenResponse;
