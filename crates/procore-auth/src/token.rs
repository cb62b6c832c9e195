//! OAuth token endpoint interactions
//!
//! Handles the two grant types the SDK uses:
//! 1. Authorization code exchange (completes the PKCE flow)
//! 2. Refresh token (driven by `CredentialManager`)
//!
//! Both POST form-encoded bodies to `AuthOptions::token_endpoint` and share
//! one response shape.

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Url;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancel::with_cancel;
use crate::constants::DEFAULT_TOKEN_TYPE;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::options::AuthOptions;

/// Token endpoint response for both grants.
///
/// Every field is optional on the wire so that a missing `access_token`
/// surfaces as a typed error rather than a generic parse failure.
#[derive(Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Build a credential issued at `issued_at`.
    ///
    /// `refresh_token` and `scopes` fall back to `previous` when the response
    /// omits them; servers do not have to rotate refresh tokens on every call.
    pub fn into_credential(
        self,
        issued_at: DateTime<Utc>,
        previous: Option<&Credential>,
    ) -> Result<Credential> {
        let token = non_blank(self.access_token).ok_or_else(|| {
            Error::InvalidOperation("token response missing required 'access_token' field".into())
        })?;

        let token_type =
            non_blank(self.token_type).unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

        let lifetime = self.expires_in.unwrap_or(0).max(0);
        let expires_at = TimeDelta::try_seconds(lifetime)
            .and_then(|d| issued_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let refresh_token = non_blank(self.refresh_token)
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        let scopes = self
            .scope
            .map(|s| split_scopes(&s))
            .or_else(|| previous.and_then(|p| p.scopes.clone()));

        Ok(Credential {
            token,
            token_type,
            expires_at,
            refresh_token,
            scopes,
        })
    }
}

/// Exchange an authorization code (plus PKCE verifier) for a credential.
pub async fn authorization_code_grant(
    client: &reqwest::Client,
    options: &AuthOptions,
    code: &str,
    code_verifier: Option<&str>,
    cancel: &CancellationToken,
) -> Result<Credential> {
    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", options.redirect_uri.as_str()),
        ("client_id", options.client_id.as_str()),
        ("client_secret", options.client_secret.expose().as_str()),
    ];
    if let Some(verifier) = code_verifier {
        params.push(("code_verifier", verifier));
    }

    let issued_at = Utc::now();
    let response = request_token(client, &options.token_endpoint, &params, cancel).await?;
    response.into_credential(issued_at, None)
}

/// Redeem `previous.refresh_token` for a new credential.
///
/// The caller guarantees `previous` carries a refresh token.
pub async fn refresh_token_grant(
    client: &reqwest::Client,
    options: &AuthOptions,
    previous: &Credential,
    cancel: &CancellationToken,
) -> Result<Credential> {
    let refresh = previous
        .refresh_token
        .as_deref()
        .ok_or_else(|| Error::InvalidOperation("no refresh token available".into()))?;

    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh),
        ("client_id", options.client_id.as_str()),
        ("client_secret", options.client_secret.expose().as_str()),
    ];

    let issued_at = Utc::now();
    let response = request_token(client, &options.token_endpoint, &params, cancel).await?;
    response.into_credential(issued_at, Some(previous))
}

/// POST a form to the token endpoint and decode the JSON body.
///
/// Non-2xx → `HttpStatus` with the body text; undecodable JSON → `Parse`.
pub async fn request_token(
    client: &reqwest::Client,
    endpoint: &Url,
    params: &[(&str, &str)],
    cancel: &CancellationToken,
) -> Result<TokenResponse> {
    let grant_type = params
        .iter()
        .find(|(k, _)| *k == "grant_type")
        .map(|(_, v)| *v)
        .unwrap_or("unknown");
    debug!(grant_type, endpoint = %endpoint, "requesting token");

    let response = with_cancel(cancel, async {
        client
            .post(endpoint.clone())
            .form(params)
            .send()
            .await
            .map_err(|e| Error::Http(format!("token request failed: {e}")))
    })
    .await?;

    let status = response.status();
    let body = with_cancel(cancel, async {
        response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading token response: {e}")))
    })
    .await?;

    if !status.is_success() {
        debug!(grant_type, status = status.as_u16(), "token endpoint rejected request");
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Parse(format!("invalid token response: {e}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(' ')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
