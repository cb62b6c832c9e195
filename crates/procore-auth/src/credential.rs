//! Bearer credential model
//!
//! A `Credential` is an immutable snapshot of what the token endpoint issued.
//! Refresh never edits one in place; it builds a new value and the manager
//! swaps it into the store.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A bearer credential and its metadata.
///
/// `expires_at` is absolute UTC, computed from the token endpoint's
/// `expires_in` delta at the time of the call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    /// Usually "Bearer"; kept exactly as the server sent it
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl Credential {
    pub fn new(
        token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            token_type: token_type.into(),
            expires_at,
            refresh_token: None,
            scopes: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `now + margin` has reached the expiry.
    ///
    /// An overflowing margin counts as reached, so an absurdly large margin
    /// means "always refresh".
    pub fn needs_refresh(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        match TimeDelta::from_std(margin)
            .ok()
            .and_then(|m| now.checked_add_signed(m))
        {
            Some(threshold) => threshold >= self.expires_at,
            None => true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Value for the `Authorization` header: `<token_type> <token>`.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Broadcast after every successful refresh.
#[derive(Debug, Clone)]
pub struct CredentialRefreshedEvent {
    pub new_credential: Credential,
    /// The credential that was replaced, `None` on first issuance
    pub previous_credential: Option<Credential>,
}

/// Outcome of `CredentialManager::get_credential`.
///
/// Separates "degrade gracefully" (`Stale`) from hard failures, which come
/// back as `Err` from the call itself.
#[derive(Debug)]
pub enum CredentialStatus {
    /// Nothing stored for this identity
    Missing,
    /// Stored credential is outside the refresh margin
    Valid(Credential),
    /// A refresh ran (here or in a concurrent caller) and produced this
    Refreshed(Credential),
    /// Refresh was due but failed; the existing credential may be expired
    Stale { credential: Credential, error: Error },
}

impl CredentialStatus {
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            CredentialStatus::Missing => None,
            CredentialStatus::Valid(c) | CredentialStatus::Refreshed(c) => Some(c),
            CredentialStatus::Stale { credential, .. } => Some(credential),
        }
    }

    pub fn into_credential(self) -> Option<Credential> {
        match self {
            CredentialStatus::Missing => None,
            CredentialStatus::Valid(c) | CredentialStatus::Refreshed(c) => Some(c),
            CredentialStatus::Stale { credential, .. } => Some(credential),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, CredentialStatus::Stale { .. })
    }

    /// Label for logging and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            CredentialStatus::Missing => "missing",
            CredentialStatus::Valid(_) => "valid",
            CredentialStatus::Refreshed(_) => "refreshed",
            CredentialStatus::Stale { .. } => "stale",
        }
    }
}
