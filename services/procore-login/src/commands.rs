//! Command implementations
//!
//! Each command returns the text to print so that output can be checked in
//! tests without capturing stdout. Tokens never appear in that text.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use procore_auth::{
    Credential, CredentialManager, CredentialStatus, CredentialStore, EncryptedFileStore,
    MemoryStore, PkceFlow, PlatformStore,
};
use procore_http::{AuthInterceptor, ReqwestTransport, Transport};
use reqwest::Url;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::callback::{self, CallbackListener, CallbackParams};
use crate::config::{Config, StorageBackend, StorageConfig};
use crate::error::Error;

/// How long `login` waits for the browser to come back.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything a command needs, built once from configuration.
pub struct App {
    pub flow: PkceFlow,
    pub manager: Arc<CredentialManager>,
    pub client: reqwest::Client,
}

impl App {
    pub fn from_config(config: &Config) -> Result<Self> {
        let options = Arc::new(config.auth_options()?);
        let client = reqwest::Client::new();
        let store = build_store(&config.storage)?;
        let manager = CredentialManager::new(store, options.clone(), client.clone())?;
        let flow = PkceFlow::new(options, client.clone())?;
        Ok(Self {
            flow,
            manager: Arc::new(manager),
            client,
        })
    }

    pub async fn login(&self, cancel: &CancellationToken) -> Result<String> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let request = self.flow.authorization_request(Some(&state));
        let redirect = Url::parse(&self.flow.options().redirect_uri)
            .context("redirect_uri is not a valid URL")?;

        let code = if callback::is_loopback(&redirect) {
            let listener = CallbackListener::bind(&redirect, state.as_str()).await?;
            println!(
                "Open this URL in your browser to authorize:\n\n  {}\n",
                request.url
            );
            listener.wait_for_code(CALLBACK_TIMEOUT, cancel).await?
        } else {
            println!(
                "Open this URL in your browser to authorize:\n\n  {}\n",
                request.url
            );
            println!("Then paste the URL you were redirected to (or just the code):");
            let line = read_line(cancel).await?;
            code_from_input(&line, &state)?
        };

        let credential = self
            .flow
            .exchange_code(&code, &request.code_verifier, cancel)
            .await
            .context("exchanging authorization code")?;
        let summary = format!("logged in; {}", describe_credential(&credential, Utc::now()));
        self.manager
            .store_credential(credential, cancel)
            .await
            .context("storing credential")?;
        Ok(summary)
    }

    pub async fn status(&self, cancel: &CancellationToken) -> Result<String> {
        let status = self
            .manager
            .get_credential(cancel)
            .await
            .context("reading credential")?;
        Ok(describe_status(&status, Utc::now()))
    }

    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<String> {
        let credential = self
            .manager
            .refresh(cancel)
            .await
            .context("refreshing credential")?;
        Ok(format!(
            "refreshed; {}",
            describe_credential(&credential, Utc::now())
        ))
    }

    pub async fn logout(&self, cancel: &CancellationToken) -> Result<String> {
        self.manager
            .clear_credential(cancel)
            .await
            .context("clearing credential")?;
        Ok("logged out".to_string())
    }

    /// Authenticated GET; returns the status line followed by the body.
    pub async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        let request = self
            .client
            .get(url)
            .build()
            .with_context(|| format!("invalid request URL {url}"))?;
        let transport =
            AuthInterceptor::new(ReqwestTransport::new(self.client.clone()), self.manager.clone());

        let response = transport.send(request, cancel).await?;
        let status = response.status();
        info!(url, status = status.as_u16(), "request completed");
        let body = response.text().await.context("reading response body")?;
        Ok(format!("{status}\n{body}"))
    }
}

pub fn build_store(storage: &StorageConfig) -> Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match storage.backend {
        StorageBackend::File => {
            let passphrase = storage
                .passphrase
                .as_ref()
                .context("file storage requires a passphrase")?;
            Arc::new(EncryptedFileStore::new(
                storage.path.clone(),
                passphrase.expose().as_bytes(),
            )?)
        }
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Keyring => Arc::new(PlatformStore::new()?),
    };
    Ok(store)
}

/// Extract the code from what the user pasted.
///
/// Accepts the full redirect URL, `code#state`, or the bare code.
pub fn code_from_input(input: &str, expected_state: &str) -> crate::error::Result<String> {
    let input = input.trim();

    if let Some(url) = Url::parse(input).ok().filter(|url| url.query().is_some()) {
        let mut params = CallbackParams::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        return callback::evaluate(&params, expected_state);
    }

    let code = match input.split_once('#') {
        Some((code, state)) if state == expected_state => code,
        Some(_) => return Err(Error::StateMismatch),
        None => input,
    };
    if code.is_empty() {
        return Err(Error::MissingCode);
    }
    Ok(code.to_string())
}

async fn read_line(cancel: &CancellationToken) -> crate::error::Result<String> {
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        read = stdin.read_line(&mut line) => {
            read.map_err(|e| Error::Listener(format!("reading stdin: {e}")))?;
            Ok(line)
        }
    }
}

pub fn describe_status(status: &CredentialStatus, now: DateTime<Utc>) -> String {
    match status {
        CredentialStatus::Missing => "not logged in".to_string(),
        CredentialStatus::Valid(c) => format!("valid; {}", describe_credential(c, now)),
        CredentialStatus::Refreshed(c) => format!("refreshed; {}", describe_credential(c, now)),
        CredentialStatus::Stale { credential, error } => format!(
            "stale; {}; refresh failed: {error}",
            describe_credential(credential, now)
        ),
    }
}

fn describe_credential(credential: &Credential, now: DateTime<Utc>) -> String {
    let remaining = credential.expires_at - now;
    let mut text = if remaining.num_seconds() > 0 {
        format!(
            "expires at {} (in {}m)",
            credential.expires_at.to_rfc3339(),
            remaining.num_minutes()
        )
    } else {
        format!("expired at {}", credential.expires_at.to_rfc3339())
    };
    if let Some(scopes) = &credential.scopes {
        text.push_str(&format!("; scopes: {}", scopes.join(" ")));
    }
    if !credential.can_refresh() {
        text.push_str("; no refresh token");
    }
    text
}
