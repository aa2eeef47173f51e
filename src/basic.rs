use async_trait::async_trait;
use bytes::Bytes;
use http::Request;
use serde_json::Value;
use url::Url;

use crate::adapter::Adapter;
use crate::types::{RuntimeTag, SendResult, VerificationResult};

/// Plain HTTP transport with no authentication.
///
/// Sends are a direct JSON POST; every inbound request is accepted.
#[derive(Debug, Clone, Default)]
pub struct BasicAdapter {
    client: reqwest::Client,
}

impl BasicAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter for BasicAdapter {
    async fn verify(
        &self,
        _request: &Request<Bytes>,
        _raw_body: &str,
        _runtime: RuntimeTag,
    ) -> VerificationResult {
        VerificationResult::authentic()
    }

    async fn send(&self, url: &Url, payload: &Value, runtime: RuntimeTag) -> SendResult {
        let response = self.client.post(url.clone()).json(payload).send().await;

        match response.and_then(|resp| resp.error_for_status()) {
            Ok(_) => {
                tracing::debug!(%url, %runtime, "direct POST delivered");
                SendResult::delivered(
                    format!("POST to {url} succeeded"),
                    Some(chrono::Utc::now().to_rfc3339()),
                )
            }
            Err(err) => {
                tracing::warn!(%url, %runtime, error = %err, "direct POST failed");
                SendResult::failed(format!("POST to {url} failed: {err}"))
            }
        }
    }
}
