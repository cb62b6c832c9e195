//! OAuth client configuration
//!
//! `AuthOptions` is built once by the embedding application and injected into
//! `PkceFlow` and `CredentialManager`. Nothing here reads the environment; the
//! login CLI owns file and env resolution.

use std::time::Duration;

use common::Secret;
use reqwest::Url;

use crate::constants::{AUTHORIZATION_ENDPOINT, DEFAULT_REFRESH_MARGIN_SECS, TOKEN_ENDPOINT};
use crate::error::{Error, Result};

/// OAuth 2.0 client settings for a single client identity.
#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Redirect URI registered with the authorization server
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    /// Time before expiry at which a credential is refreshed instead of used.
    pub refresh_margin: Duration,
    pub use_pkce: bool,
}

impl AuthOptions {
    /// Options with the Procore endpoint defaults, a five minute refresh
    /// margin and PKCE enabled.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            authorization_endpoint: default_url(AUTHORIZATION_ENDPOINT),
            token_endpoint: default_url(TOKEN_ENDPOINT),
            refresh_margin: Duration::from_secs(DEFAULT_REFRESH_MARGIN_SECS),
            use_pkce: true,
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_token_endpoint(mut self, endpoint: Url) -> Self {
        self.token_endpoint = endpoint;
        self
    }

    pub fn with_authorization_endpoint(mut self, endpoint: Url) -> Self {
        self.authorization_endpoint = endpoint;
        self
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    /// Reject configurations that cannot produce a working flow.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::InvalidArgument("client_id must not be empty".into()));
        }
        if self.client_secret.is_blank() {
            return Err(Error::InvalidArgument(
                "client_secret must not be empty".into(),
            ));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "redirect_uri must not be empty".into(),
            ));
        }
        for (name, url) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
        ] {
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(Error::InvalidArgument(format!(
                    "{name} must use http or https, got: {url}"
                )));
            }
        }
        Ok(())
    }
}

fn default_url(raw: &'static str) -> Url {
    Url::parse(raw).expect("built-in endpoint is a valid URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> AuthOptions {
        AuthOptions::new("client-123", "secret", "http://127.0.0.1:8765/callback")
    }

    #[test]
    fn defaults_match_procore_endpoints() {
        let opts = options();
        assert_eq!(opts.authorization_endpoint.as_str(), AUTHORIZATION_ENDPOINT);
        assert_eq!(opts.token_endpoint.as_str(), TOKEN_ENDPOINT);
        assert_eq!(opts.refresh_margin, Duration::from_secs(300));
        assert!(opts.use_pkce);
        assert!(opts.scopes.is_empty());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn builders_override_fields() {
        let opts = options()
            .with_scopes(["read", "write"])
            .with_refresh_margin(Duration::ZERO)
            .with_pkce(false)
            .with_token_endpoint(Url::parse("http://localhost:9000/token").unwrap());
        assert_eq!(opts.scopes, vec!["read", "write"]);
        assert_eq!(opts.refresh_margin, Duration::ZERO);
        assert!(!opts.use_pkce);
        assert_eq!(opts.token_endpoint.as_str(), "http://localhost:9000/token");
    }

    #[test]
    fn blank_client_id_rejected() {
        let opts = AuthOptions::new("  ", "secret", "http://localhost/cb");
        assert!(matches!(opts.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn blank_client_secret_rejected() {
        let opts = AuthOptions::new("client", " ", "http://localhost/cb");
        let err = opts.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("client_secret"), "got: {err}");
    }

    #[test]
    fn blank_redirect_uri_rejected() {
        let opts = AuthOptions::new("client", "secret", "");
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("redirect_uri"), "got: {err}");
    }

    #[test]
    fn non_http_endpoint_rejected() {
        let opts = options().with_token_endpoint(Url::parse("ftp://example.com/token").unwrap());
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("token_endpoint"), "got: {err}");
    }

    #[test]
    fn client_secret_is_redacted_in_debug() {
        let debug = format!("{:?}", options());
        assert!(!debug.contains("\"secret\""), "got: {debug}");
        assert!(debug.contains("[REDACTED]"));
    }
}
