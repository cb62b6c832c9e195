//! One-shot loopback listener for the OAuth redirect
//!
//! When the registered redirect URI points at this machine, `login` binds it,
//! waits for the browser to land on `?code=...&state=...`, answers with a
//! short page and shuts the listener down.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use reqwest::Url;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// How long the listener lingers for in-flight responses after the code arrives.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

const SUCCESS_PAGE: &str =
    "<html><body><h1>Login complete</h1><p>You can close this window.</p></body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h1>Login failed</h1><p>Return to the terminal for details.</p></body></html>";

/// Query parameters the authorization server appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Check a redirect against the state we sent and pull out the code.
pub fn evaluate(params: &CallbackParams, expected_state: &str) -> Result<String> {
    if let Some(error) = &params.error {
        let detail = match &params.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error.clone(),
        };
        return Err(Error::Denied(detail));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(Error::StateMismatch);
    }
    match params.code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Ok(code.to_string()),
        _ => Err(Error::MissingCode),
    }
}

/// Whether the redirect URI can be served by a local listener.
pub fn is_loopback(redirect_uri: &Url) -> bool {
    if redirect_uri.scheme() != "http" {
        return false;
    }
    match redirect_uri.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    result_tx: Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>,
}

/// Router answering the redirect path. The first request's outcome is sent
/// on `result_tx`; later requests get a page but are otherwise ignored.
pub fn callback_router(
    path: &str,
    expected_state: &str,
    result_tx: oneshot::Sender<Result<String>>,
) -> Router {
    let state = CallbackState {
        expected_state: Arc::from(expected_state),
        result_tx: Arc::new(Mutex::new(Some(result_tx))),
    };
    Router::new()
        .route(path, get(handle_callback))
        .with_state(state)
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = evaluate(&params, &state.expected_state);
    let response = match &outcome {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_PAGE)),
        Err(e) => {
            warn!(error = %e, "authorization callback rejected");
            (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
        }
    };

    if let Some(tx) = state.result_tx.lock().await.take() {
        let _ = tx.send(outcome);
    } else {
        debug!("ignoring repeated authorization callback");
    }
    response
}

pub struct CallbackListener {
    listener: TcpListener,
    path: String,
    expected_state: String,
}

impl CallbackListener {
    /// Bind the host and port of `redirect_uri`.
    pub async fn bind(redirect_uri: &Url, expected_state: impl Into<String>) -> Result<Self> {
        let host = redirect_uri
            .host_str()
            .ok_or_else(|| Error::Listener(format!("redirect URI has no host: {redirect_uri}")))?;
        let port = redirect_uri
            .port_or_known_default()
            .ok_or_else(|| Error::Listener(format!("redirect URI has no port: {redirect_uri}")))?;
        let addr = format!("{host}:{port}");

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Listener(format!("binding {addr}: {e}")))?;
        info!(addr = %addr, path = redirect_uri.path(), "waiting for authorization callback");

        Ok(Self {
            listener,
            path: redirect_uri.path().to_string(),
            expected_state: expected_state.into(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Listener(e.to_string()))
    }

    /// Serve until the first callback, `timeout`, or cancellation.
    pub async fn wait_for_code(
        self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let (result_tx, result_rx) = oneshot::channel();
        let app = callback_router(&self.path, &self.expected_state, result_tx);

        let stop = CancellationToken::new();
        let server_stop = stop.clone();
        let server = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async move { server_stop.cancelled().await })
                .await
        });

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = result_rx => result
                .unwrap_or_else(|_| Err(Error::Listener("callback server stopped".into()))),
            _ = tokio::time::sleep(timeout) => Err(Error::CallbackTimeout),
        };

        stop.cancel();
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Err(e))) => warn!(error = %e, "callback server error during shutdown"),
            Err(_) => debug!("callback server shutdown grace elapsed"),
            _ => {}
        }
        outcome
    }
}
