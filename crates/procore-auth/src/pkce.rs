//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the OAuth
//! authorization flow. The verifier stays with the client and is sent during
//! token exchange; the challenge is included in the authorization URL so the
//! authorization server can check that the exchange came from the same party
//! that started the flow.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use reqwest::Url;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::options::AuthOptions;
use crate::token;

/// Number of random bytes behind a verifier (86 base64url characters).
const VERIFIER_BYTES: usize = 64;

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encoded as URL-safe base64 without padding. RFC 7636
/// requires 43-128 characters; the output is always 86.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Authorization URL plus the verifier that must accompany the code exchange.
#[derive(Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub code_verifier: String,
}

impl fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("url", &self.url.as_str())
            .field("code_verifier", &"[REDACTED]")
            .finish()
    }
}

/// Drives the authorization-code leg of the OAuth flow for one client.
#[derive(Debug, Clone)]
pub struct PkceFlow {
    options: Arc<AuthOptions>,
    client: reqwest::Client,
}

impl PkceFlow {
    pub fn new(options: Arc<AuthOptions>, client: reqwest::Client) -> Result<Self> {
        options.validate()?;
        Ok(Self { options, client })
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Build the authorization URL the user's browser should visit.
    ///
    /// Every call generates a fresh verifier. `state` is appended only when
    /// present and non-empty.
    pub fn authorization_request(&self, state: Option<&str>) -> AuthorizationRequest {
        let code_verifier = generate_verifier();
        let mut url = self.options.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.options.client_id)
                .append_pair("redirect_uri", &self.options.redirect_uri)
                .append_pair("scope", &self.options.scopes.join(" "));
            if self.options.use_pkce {
                query
                    .append_pair("code_challenge", &compute_challenge(&code_verifier))
                    .append_pair("code_challenge_method", "S256");
            }
            if let Some(state) = state.filter(|s| !s.is_empty()) {
                query.append_pair("state", state);
            }
        }

        debug!(
            client_id = %self.options.client_id,
            pkce = self.options.use_pkce,
            "built authorization request"
        );
        AuthorizationRequest { url, code_verifier }
    }

    /// Exchange the authorization code returned to the redirect URI.
    ///
    /// Blank inputs are rejected before any network call. The verifier is
    /// only required (and only sent) when PKCE is enabled.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        cancel: &CancellationToken,
    ) -> Result<Credential> {
        if code.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "authorization code must not be empty".into(),
            ));
        }
        let verifier = if self.options.use_pkce {
            if code_verifier.trim().is_empty() {
                return Err(Error::InvalidArgument(
                    "code verifier must not be empty".into(),
                ));
            }
            Some(code_verifier)
        } else {
            None
        };

        let credential =
            token::authorization_code_grant(&self.client, &self.options, code, verifier, cancel)
                .await?;
        info!(
            client_id = %self.options.client_id,
            expires_at = %credential.expires_at,
            "authorization code exchanged"
        );
        Ok(credential)
    }
}
