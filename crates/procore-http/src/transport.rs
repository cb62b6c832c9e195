//! Plain reqwest transport

use tokio_util::sync::CancellationToken;

use crate::{Error, SendFuture, Transport};

/// Sends requests through a shared `reqwest::Client` without modification.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: reqwest::Request,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = self.client.execute(request) => {
                    result.map_err(|e| Error::Transport(e.to_string()))
                }
            }
        })
    }
}
