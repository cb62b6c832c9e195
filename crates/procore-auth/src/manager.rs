//! Credential lifecycle for one client identity
//!
//! `CredentialManager` hands out the stored credential while it is outside the
//! refresh margin and redeems the refresh token once it is not. Refreshes are
//! single-flight: the whole read-refresh-persist cycle runs under a tokio
//! Mutex, and a caller that waited behind another caller's refresh gets that
//! refresh's outcome (the stored replacement, or the same error) instead of
//! issuing a second request.
//!
//! Refresh failures in `get_credential` degrade to `CredentialStatus::Stale`
//! rather than erroring, so callers can still attempt the request with what
//! they have. Explicit `refresh` calls propagate the error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::with_cancel;
use crate::constants::STORAGE_KEY_PREFIX;
use crate::credential::{Credential, CredentialRefreshedEvent, CredentialStatus};
use crate::error::{Error, Result};
use crate::metrics::{RefreshOutcome, record_refresh};
use crate::options::AuthOptions;
use crate::store::CredentialStore;
use crate::token;

/// Buffered refresh events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 16;

/// Outcome of the most recent refresh attempt, guarded by the refresh lock.
#[derive(Default)]
struct LastRefresh {
    failure: Option<Error>,
}

pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    options: Arc<AuthOptions>,
    client: reqwest::Client,
    storage_key: String,
    refresh_lock: Mutex<LastRefresh>,
    /// Completed refresh attempts. Bumped while the lock is held.
    attempts: AtomicU64,
    events: broadcast::Sender<CredentialRefreshedEvent>,
}

impl CredentialManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        options: Arc<AuthOptions>,
        client: reqwest::Client,
    ) -> Result<Self> {
        options.validate()?;
        let storage_key = format!("{STORAGE_KEY_PREFIX}{}", options.client_id);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            store,
            options,
            client,
            storage_key,
            refresh_lock: Mutex::new(LastRefresh::default()),
            attempts: AtomicU64::new(0),
            events,
        })
    }

    /// Key under which this identity's credential is persisted.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Receive a `CredentialRefreshedEvent` after every successful refresh.
    pub fn subscribe(&self) -> broadcast::Receiver<CredentialRefreshedEvent> {
        self.events.subscribe()
    }

    /// Current credential, refreshed first if it is inside the margin.
    ///
    /// Store read failures and cancellation are errors. A failed refresh is
    /// not: the existing credential comes back as `Stale` with the reason.
    pub async fn get_credential(&self, cancel: &CancellationToken) -> Result<CredentialStatus> {
        let Some(current) = self.load(cancel).await? else {
            debug!(storage_key = %self.storage_key, "no stored credential");
            return Ok(CredentialStatus::Missing);
        };

        if !current.needs_refresh(self.options.refresh_margin, Utc::now()) {
            return Ok(CredentialStatus::Valid(current));
        }

        debug!(
            storage_key = %self.storage_key,
            expires_at = %current.expires_at,
            "credential inside refresh margin"
        );
        match self.refresh_after(Some(&current.token), cancel).await {
            Ok(fresh) => Ok(CredentialStatus::Refreshed(fresh)),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(error) => {
                warn!(
                    storage_key = %self.storage_key,
                    error = %error,
                    "refresh failed, returning existing credential"
                );
                Ok(CredentialStatus::Stale {
                    credential: current,
                    error,
                })
            }
        }
    }

    /// Redeem the stored refresh token now, regardless of expiry.
    ///
    /// If another caller completes a refresh while this one waits for the
    /// lock, its result is returned and no request is made.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<Credential> {
        let observed = self.load(cancel).await?.map(|c| c.token);
        self.refresh_after(observed.as_deref(), cancel).await
    }

    /// Refresh because the server rejected `rejected_token`.
    ///
    /// When the store already holds a different token, some other caller has
    /// refreshed since `rejected_token` was handed out and that credential is
    /// returned without a network call.
    pub async fn refresh_rejected(
        &self,
        rejected_token: &str,
        cancel: &CancellationToken,
    ) -> Result<Credential> {
        self.refresh_after(Some(rejected_token), cancel).await
    }

    /// Persist a credential obtained outside the manager (e.g. code exchange).
    pub async fn store_credential(
        &self,
        credential: Credential,
        cancel: &CancellationToken,
    ) -> Result<()> {
        with_cancel(cancel, self.store.store(&self.storage_key, credential)).await?;
        info!(storage_key = %self.storage_key, "credential stored");
        Ok(())
    }

    pub async fn clear_credential(&self, cancel: &CancellationToken) -> Result<()> {
        with_cancel(cancel, self.store.delete(&self.storage_key)).await?;
        info!(storage_key = %self.storage_key, "credential cleared");
        Ok(())
    }

    async fn load(&self, cancel: &CancellationToken) -> Result<Option<Credential>> {
        with_cancel(cancel, self.store.get(&self.storage_key)).await
    }

    /// Single-flight refresh. `observed` is the token the caller last saw;
    /// if the store moved past it while we waited for the lock, that newer
    /// credential wins. If an attempt failed while we waited, its error is
    /// returned without another request.
    async fn refresh_after(
        &self,
        observed: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Credential> {
        let queued_at = self.attempts.load(Ordering::Acquire);
        let mut last = with_cancel(cancel, async { Ok(self.refresh_lock.lock().await) }).await?;

        let finished_while_waiting = self.attempts.load(Ordering::Acquire) != queued_at;
        if let (true, Some(error)) = (finished_while_waiting, &last.failure) {
            debug!(
                storage_key = %self.storage_key,
                error = %error,
                "refresh failed while waiting, sharing its error"
            );
            record_refresh(RefreshOutcome::Coalesced);
            return Err(error.clone());
        }

        let current = self.load(cancel).await?;
        match (&current, observed) {
            (Some(current), Some(observed)) if current.token != observed => {
                debug!(storage_key = %self.storage_key, "credential already refreshed by another caller");
                record_refresh(RefreshOutcome::Coalesced);
                return Ok(current.clone());
            }
            _ => {}
        }

        let Some(current) = current.filter(Credential::can_refresh) else {
            record_refresh(RefreshOutcome::NoRefreshToken);
            return Err(Error::InvalidOperation("no refresh token available".into()));
        };

        let result: Result<Credential> = async {
            let fresh =
                token::refresh_token_grant(&self.client, &self.options, &current, cancel).await?;
            with_cancel(cancel, self.store.store(&self.storage_key, fresh.clone())).await?;
            Ok(fresh)
        }
        .await;

        let fresh = match result {
            Ok(fresh) => fresh,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                record_refresh(RefreshOutcome::Failure);
                last.failure = Some(e.clone());
                self.attempts.fetch_add(1, Ordering::Release);
                return Err(e);
            }
        };
        last.failure = None;
        self.attempts.fetch_add(1, Ordering::Release);

        record_refresh(RefreshOutcome::Success);
        info!(
            storage_key = %self.storage_key,
            expires_at = %fresh.expires_at,
            "credential refreshed"
        );
        // No subscribers is not an error.
        let _ = self.events.send(CredentialRefreshedEvent {
            new_credential: fresh.clone(),
            previous_credential: Some(current),
        });
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreFuture};
    use chrono::TimeDelta;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use reqwest::Url;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options_for(server: &MockServer) -> AuthOptions {
        AuthOptions::new("client-1", "s3cret", "http://127.0.0.1:8765/callback")
            .with_token_endpoint(Url::parse(&format!("{}/oauth/token", server.uri())).unwrap())
    }

    fn credential_expiring_in(token: &str, secs: i64) -> Credential {
        Credential::new(token, "Bearer", Utc::now() + TimeDelta::seconds(secs))
            .with_refresh_token("rt_old")
            .with_scopes(["read"])
    }

    fn token_json(access: &str, expires_in: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access,
            "token_type": "Bearer",
            "expires_in": expires_in
        }))
    }

    async fn manager_with(
        server: &MockServer,
        stored: Option<Credential>,
    ) -> (CredentialManager, Arc<MemoryStore>) {
        manager_with_options(options_for(server), stored).await
    }

    async fn manager_with_options(
        options: AuthOptions,
        stored: Option<Credential>,
    ) -> (CredentialManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        if let Some(cred) = stored {
            store.store("credential_client-1", cred).await.unwrap();
        }
        let manager = CredentialManager::new(
            store.clone() as Arc<dyn CredentialStore>,
            Arc::new(options),
            reqwest::Client::new(),
        )
        .unwrap();
        (manager, store)
    }

    #[tokio::test]
    async fn storage_key_derives_from_client_id() {
        let server = MockServer::start().await;
        let (manager, _) = manager_with(&server, None).await;
        assert_eq!(manager.storage_key(), "credential_client-1");
        assert_eq!(manager.options().client_id, "client-1");
    }

    #[tokio::test]
    async fn missing_credential_reports_missing() {
        let server = MockServer::start().await;
        let (manager, _) = manager_with(&server, None).await;
        let status = manager
            .get_credential(&CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(status, CredentialStatus::Missing));
    }

    #[tokio::test]
    async fn valid_credential_returned_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600))
            .expect(0)
            .mount(&server)
            .await;

        let stored = credential_expiring_in("at_old", 3600);
        let (manager, _) = manager_with(&server, Some(stored.clone())).await;
        let status = manager
            .get_credential(&CancellationToken::new())
            .await
            .unwrap();

        match status {
            CredentialStatus::Valid(cred) => assert_eq!(cred, stored),
            other => panic!("expected Valid, got {other:?}"),
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn zero_margin_uses_credential_until_expiry() {
        let server = MockServer::start().await;
        let options = options_for(&server).with_refresh_margin(Duration::ZERO);
        let (manager, _) =
            manager_with_options(options, Some(credential_expiring_in("at_old", 120))).await;
        let status = manager
            .get_credential(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status.label(), "valid");
    }

    #[tokio::test]
    async fn credential_inside_margin_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt_old"))
            .respond_with(token_json("at_new", 3600))
            .expect(1)
            .mount(&server)
            .await;

        let (manager, store) =
            manager_with(&server, Some(credential_expiring_in("at_old", 60))).await;
        let before = Utc::now();
        let status = manager
            .get_credential(&CancellationToken::new())
            .await
            .unwrap();

        let cred = match status {
            CredentialStatus::Refreshed(cred) => cred,
            other => panic!("expected Refreshed, got {other:?}"),
        };
        assert_eq!(cred.token, "at_new");
        assert!(cred.expires_at >= before + TimeDelta::seconds(3600));
        assert!(cred.expires_at <= Utc::now() + TimeDelta::seconds(3600));
        assert_eq!(cred.refresh_token.as_deref(), Some("rt_old"));
        assert_eq!(cred.scopes, Some(vec!["read".to_string()]));

        let persisted = store.get("credential_client-1").await.unwrap().unwrap();
        assert_eq!(persisted, cred);
        server.verify().await;
    }

    #[tokio::test]
    async fn refreshed_values_replace_previous_when_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_new",
                "expires_in": 3600,
                "refresh_token": "rt_new",
                "scope": "read write"
            })))
            .mount(&server)
            .await;

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", 10))).await;
        let cred = manager.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(cred.refresh_token.as_deref(), Some("rt_new"));
        assert_eq!(
            cred.scopes,
            Some(vec!["read".to_string(), "write".to_string()])
        );
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", -5))).await;
        let manager = Arc::new(manager);

        let mut handles = vec![];
        for _ in 0..10 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.get_credential(&CancellationToken::new()).await
            }));
        }

        for h in handles {
            let status = h.await.unwrap().unwrap();
            match status {
                CredentialStatus::Refreshed(cred) => assert_eq!(cred.token, "at_new"),
                other => panic!("expected Refreshed, got {other:?}"),
            }
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_failed_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string("invalid_grant")
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stored = credential_expiring_in("at_old", -5);
        let (manager, _) = manager_with(&server, Some(stored.clone())).await;
        let manager = Arc::new(manager);

        let mut handles = vec![];
        for _ in 0..5 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.get_credential(&CancellationToken::new()).await
            }));
        }

        for h in handles {
            match h.await.unwrap().unwrap() {
                CredentialStatus::Stale { credential, error } => {
                    assert_eq!(credential, stored);
                    assert_eq!(error.status(), Some(400));
                }
                other => panic!("expected Stale, got {other:?}"),
            }
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn caller_after_failed_refresh_tries_again() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600))
            .expect(1)
            .mount(&server)
            .await;

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", -5))).await;
        let cancel = CancellationToken::new();

        assert!(manager.get_credential(&cancel).await.unwrap().is_stale());
        match manager.get_credential(&cancel).await.unwrap() {
            CredentialStatus::Refreshed(cred) => assert_eq!(cred.token, "at_new"),
            other => panic!("expected Refreshed, got {other:?}"),
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600))
            .expect(0)
            .mount(&server)
            .await;

        let stored = Credential::new("at_old", "Bearer", Utc::now());
        let (manager, _) = manager_with(&server, Some(stored)).await;
        let err = manager.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)), "got: {err:?}");
        assert_eq!(err.to_string(), "invalid operation: no refresh token available");
        server.verify().await;
    }

    #[tokio::test]
    async fn refresh_with_nothing_stored_is_invalid_operation() {
        let server = MockServer::start().await;
        let (manager, _) = manager_with(&server, None).await;
        let err = manager.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn failed_refresh_returns_stale_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .expect(1)
            .mount(&server)
            .await;

        let stored = credential_expiring_in("at_old", 30);
        let (manager, store) = manager_with(&server, Some(stored.clone())).await;
        let status = manager
            .get_credential(&CancellationToken::new())
            .await
            .unwrap();

        match status {
            CredentialStatus::Stale { credential, error } => {
                assert_eq!(credential, stored);
                assert_eq!(error.status(), Some(500));
            }
            other => panic!("expected Stale, got {other:?}"),
        }
        assert_eq!(
            store.get("credential_client-1").await.unwrap(),
            Some(stored)
        );
    }

    #[tokio::test]
    async fn explicit_refresh_propagates_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", 3600))).await;
        let err = manager.refresh(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn rejected_token_already_replaced_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_other", 3600))
            .expect(0)
            .mount(&server)
            .await;

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_current", 3600))).await;
        let cred = manager
            .refresh_rejected("at_superseded", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(cred.token, "at_current");
        server.verify().await;
    }

    #[tokio::test]
    async fn rejected_current_token_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600))
            .expect(1)
            .mount(&server)
            .await;

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_current", 3600))).await;
        let cred = manager
            .refresh_rejected("at_current", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(cred.token, "at_new");
        server.verify().await;
    }

    #[tokio::test]
    async fn refresh_publishes_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600))
            .mount(&server)
            .await;

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", 10))).await;
        let mut events = manager.subscribe();

        manager.refresh(&CancellationToken::new()).await.unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.new_credential.token, "at_new");
        assert_eq!(
            event.previous_credential.map(|c| c.token).as_deref(),
            Some("at_old")
        );
    }

    #[tokio::test]
    async fn refresh_succeeds_without_subscribers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600))
            .mount(&server)
            .await;

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", 10))).await;
        assert_eq!(
            manager.refresh(&CancellationToken::new()).await.unwrap().token,
            "at_new"
        );
    }

    #[tokio::test]
    async fn valid_lookup_publishes_no_event() {
        let server = MockServer::start().await;
        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", 3600))).await;
        let mut events = manager.subscribe();
        manager
            .get_credential(&CancellationToken::new())
            .await
            .unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn pre_cancelled_token_fails_fast() {
        let server = MockServer::start().await;
        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", 3600))).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            manager.get_credential(&cancel).await,
            Err(Error::Cancelled)
        ));
    }

    #[tokio::test]
    async fn cancellation_mid_refresh_releases_lock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let (manager, store) =
            manager_with(&server, Some(credential_expiring_in("at_old", 10))).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = manager.get_credential(&cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)), "got: {result:?}");
        assert!(manager.refresh_lock.try_lock().is_ok());
        assert_eq!(
            store
                .get("credential_client-1")
                .await
                .unwrap()
                .unwrap()
                .token,
            "at_old"
        );
    }

    #[tokio::test]
    async fn store_and_clear_roundtrip() {
        let server = MockServer::start().await;
        let (manager, store) = manager_with(&server, None).await;
        let cancel = CancellationToken::new();

        let cred = credential_expiring_in("at_login", 3600);
        manager.store_credential(cred.clone(), &cancel).await.unwrap();
        assert_eq!(store.get("credential_client-1").await.unwrap(), Some(cred));

        manager.clear_credential(&cancel).await.unwrap();
        manager.clear_credential(&cancel).await.unwrap();
        assert!(matches!(
            manager.get_credential(&cancel).await.unwrap(),
            CredentialStatus::Missing
        ));
    }

    struct FailingStore;

    impl CredentialStore for FailingStore {
        fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<Credential>> {
            Box::pin(async { Err(Error::Io("disk on fire".into())) })
        }

        fn store<'a>(&'a self, _key: &'a str, _credential: Credential) -> StoreFuture<'a, ()> {
            Box::pin(async { Err(Error::Io("disk on fire".into())) })
        }

        fn delete<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, ()> {
            Box::pin(async { Err(Error::Io("disk on fire".into())) })
        }
    }

    #[tokio::test]
    async fn store_read_failure_propagates() {
        let server = MockServer::start().await;
        let manager = CredentialManager::new(
            Arc::new(FailingStore),
            Arc::new(options_for(&server)),
            reqwest::Client::new(),
        )
        .unwrap();
        let err = manager
            .get_credential(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn refresh_outcomes_are_counted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_json("at_new", 3600))
            .mount(&server)
            .await;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let (manager, _) =
            manager_with(&server, Some(credential_expiring_in("at_old", 10))).await;
        let cancel = CancellationToken::new();
        manager.refresh(&cancel).await.unwrap();
        manager.refresh_rejected("at_old", &cancel).await.unwrap();

        let output = handle.render();
        assert!(
            output.contains("procore_auth_refresh_total{outcome=\"success\"} 1"),
            "got: {output}"
        );
        assert!(
            output.contains("procore_auth_refresh_total{outcome=\"coalesced\"} 1"),
            "got: {output}"
        );
    }
}
