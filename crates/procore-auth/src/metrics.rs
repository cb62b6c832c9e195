//! Credential lifecycle counters
//!
//! Recorded through the `metrics` facade; the embedding application decides
//! whether and where to export them.
//!
//! - `procore_auth_refresh_total` (counter): label `outcome`
//! - `procore_auth_retry_total` (counter): label `outcome`

/// Result of one pass through the refresh path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Token endpoint issued a new credential
    Success,
    /// Token endpoint or store failed
    Failure,
    /// Another caller already refreshed; no request was made
    Coalesced,
    /// Stored credential cannot be refreshed
    NoRefreshToken,
}

impl RefreshOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshOutcome::Success => "success",
            RefreshOutcome::Failure => "failure",
            RefreshOutcome::Coalesced => "coalesced",
            RefreshOutcome::NoRefreshToken => "no_refresh_token",
        }
    }
}

/// What the interceptor did with a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Retried,
    RefreshFailed,
    ReplayFailed,
}

impl RetryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RetryOutcome::Retried => "retried",
            RetryOutcome::RefreshFailed => "refresh_failed",
            RetryOutcome::ReplayFailed => "replay_failed",
        }
    }
}

pub fn record_refresh(outcome: RefreshOutcome) {
    metrics::counter!("procore_auth_refresh_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_retry(outcome: RetryOutcome) {
    metrics::counter!("procore_auth_retry_total", "outcome" => outcome.as_str()).increment(1);
}
