//! Credential injection with one refresh-and-retry on 401
//!
//! Outgoing requests without an `Authorization` header get the managed
//! credential attached. A 401 answer triggers one refresh through the
//! `CredentialManager` (coalesced with any concurrent refresh) and the
//! request is replayed once with the new credential. A caller-supplied
//! `Authorization` header is never overwritten on the first attempt.

use std::sync::Arc;

use procore_auth::metrics::{RetryOutcome, record_retry};
use procore_auth::{Credential, CredentialManager, CredentialStatus};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Error, Result, SendFuture, Transport};

pub struct AuthInterceptor<T> {
    inner: T,
    manager: Arc<CredentialManager>,
}

impl<T: Transport> AuthInterceptor<T> {
    pub fn new(inner: T, manager: Arc<CredentialManager>) -> Self {
        Self { inner, manager }
    }

    pub fn manager(&self) -> &Arc<CredentialManager> {
        &self.manager
    }

    /// Attach the managed credential, returning the token that was used.
    ///
    /// Failing to obtain a credential never fails the request; only
    /// cancellation does.
    async fn attach(
        &self,
        request: &mut reqwest::Request,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let status = match self.manager.get_credential(cancel).await {
            Ok(status) => status,
            Err(procore_auth::Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(error = %e, "credential lookup failed, sending without authorization");
                return Ok(None);
            }
        };

        if let CredentialStatus::Stale { error, .. } = &status {
            warn!(error = %error, "attaching stale credential");
        }
        let Some(credential) = status.into_credential() else {
            debug!("no credential stored, sending without authorization");
            return Ok(None);
        };

        match authorization_header(&credential) {
            Ok(value) => {
                request.headers_mut().insert(AUTHORIZATION, value);
                Ok(Some(credential.token))
            }
            Err(e) => {
                warn!(error = %e, "credential is not a valid header value, sending without authorization");
                Ok(None)
            }
        }
    }
}

impl<T: Transport> Transport for AuthInterceptor<T> {
    fn send<'a>(
        &'a self,
        mut request: reqwest::Request,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a> {
        Box::pin(async move {
            let attached = if request.headers().contains_key(AUTHORIZATION) {
                None
            } else {
                self.attach(&mut request, cancel).await?
            };

            // Streaming bodies cannot be cloned; that only matters on 401.
            let replay = request.try_clone();
            let method = request.method().clone();
            let url = request.url().clone();

            let response = self.inner.send(request, cancel).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            debug!(%method, %url, "received 401, refreshing credential");
            let refreshed = match attached.as_deref() {
                Some(token) => self.manager.refresh_rejected(token, cancel).await,
                None => self.manager.refresh(cancel).await,
            };
            let credential = match refreshed {
                Ok(credential) => credential,
                Err(procore_auth::Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(%method, %url, error = %e, "refresh after 401 failed, returning original response");
                    record_retry(RetryOutcome::RefreshFailed);
                    return Ok(response);
                }
            };

            let Some(mut retry) = replay else {
                record_retry(RetryOutcome::ReplayFailed);
                return Err(Error::ReplayFailed(format!(
                    "{method} {url} has a streaming body"
                )));
            };
            retry
                .headers_mut()
                .insert(AUTHORIZATION, authorization_header(&credential)?);

            record_retry(RetryOutcome::Retried);
            debug!(%method, %url, "retrying with refreshed credential");
            self.inner.send(retry, cancel).await
        })
    }
}

fn authorization_header(credential: &Credential) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&credential.authorization_value())
        .map_err(|e| Error::InvalidHeader(format!("authorization: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}
