//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from PROCORE_CLIENT_SECRET or
//! client_secret_file and the store passphrase from PROCORE_STORE_PASSPHRASE
//! or passphrase_file; neither is ever read from the TOML directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use procore_auth::AuthOptions;
use reqwest::Url;
use serde::Deserialize;

const CLIENT_SECRET_ENV: &str = "PROCORE_CLIENT_SECRET";
const PASSPHRASE_ENV: &str = "PROCORE_STORE_PASSPHRASE";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// OAuth client registration
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Secret<String>,
    /// Path to a file containing the client secret (alternative to PROCORE_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,
    #[serde(default = "default_use_pkce")]
    pub use_pkce: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
    Keyring,
}

/// Where credentials are persisted
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(skip)]
    pub passphrase: Option<Secret<String>>,
    /// Path to a file containing the store passphrase (alternative to PROCORE_STORE_PASSPHRASE)
    #[serde(default)]
    pub passphrase_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_store_path(),
            passphrase: None,
            passphrase_file: None,
        }
    }
}

fn default_refresh_margin() -> u64 {
    procore_auth::DEFAULT_REFRESH_MARGIN_SECS
}

fn default_use_pkce() -> bool {
    true
}

fn default_store_path() -> PathBuf {
    expand_home(Path::new("~/.procore/credentials.bin"))
}

/// Replace a leading `~` with `$HOME`; left untouched when HOME is unset.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order (client secret and store passphrase alike):
    /// 1. env var
    /// 2. `*_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.oauth.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if !config.oauth.redirect_uri.starts_with("http://")
            && !config.oauth.redirect_uri.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {}",
                config.oauth.redirect_uri
            )));
        }

        config.oauth.client_secret =
            resolve_secret(CLIENT_SECRET_ENV, config.oauth.client_secret_file.as_deref())?
                .ok_or_else(|| {
                    common::Error::Config(format!(
                        "client secret required: set {CLIENT_SECRET_ENV} or client_secret_file"
                    ))
                })?;

        config.storage.path = expand_home(&config.storage.path);
        config.storage.passphrase =
            resolve_secret(PASSPHRASE_ENV, config.storage.passphrase_file.as_deref())?;
        if config.storage.backend == StorageBackend::File && config.storage.passphrase.is_none() {
            return Err(common::Error::Config(format!(
                "file storage requires a passphrase: set {PASSPHRASE_ENV} or passphrase_file"
            )));
        }

        Ok(config)
    }

    /// Library options for this configuration.
    pub fn auth_options(&self) -> common::Result<AuthOptions> {
        let oauth = &self.oauth;
        let mut options = AuthOptions::new(
            oauth.client_id.clone(),
            oauth.client_secret.clone(),
            oauth.redirect_uri.clone(),
        )
        .with_scopes(oauth.scopes.iter().cloned())
        .with_refresh_margin(Duration::from_secs(oauth.refresh_margin_secs))
        .with_pkce(oauth.use_pkce);

        if let Some(endpoint) = &oauth.authorization_endpoint {
            options = options.with_authorization_endpoint(parse_url(
                "authorization_endpoint",
                endpoint,
            )?);
        }
        if let Some(endpoint) = &oauth.token_endpoint {
            options = options.with_token_endpoint(parse_url("token_endpoint", endpoint)?);
        }

        options
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;
        Ok(options)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("procore-login.toml")
    }
}

fn parse_url(name: &str, raw: &str) -> common::Result<Url> {
    Url::parse(raw).map_err(|e| common::Error::Config(format!("{name} is not a valid URL: {e}")))
}

/// Env var wins over file; a blank file yields `None`.
fn resolve_secret(env: &str, file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    // Blank env values fall through to the file, like a blank file
    if let Ok(value) = std::env::var(env) {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(Some(Secret::new(value.to_owned())));
        }
    }
    let Some(file) = file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", file.display()))
    })?;
    let value = value.trim().to_owned();
    Ok((!value.is_empty()).then(|| Secret::new(value)))
}
