//! Procore OAuth constants
//!
//! Public endpoint defaults for the Procore OAuth 2.0 service. Client
//! credentials are not here; they are supplied through `AuthOptions`.

/// Authorization endpoint (browser redirect target, never called directly)
pub const AUTHORIZATION_ENDPOINT: &str = "https://app.procore.com/oauth/authorize";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://api.procore.com/oauth/token";

/// Default time before expiry at which a credential is refreshed proactively.
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 300;

/// Token type assumed when the token endpoint omits `token_type`.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Prefix of the storage key derived from the client id.
pub const STORAGE_KEY_PREFIX: &str = "credential_";

/// Keyring service name used by the platform store.
pub const KEYRING_SERVICE: &str = "procore-sdk";
