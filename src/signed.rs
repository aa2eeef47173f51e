use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::Request;
use serde_json::Value;
use url::Url;

use crate::adapter::Adapter;
use crate::signing::{compute_signature, now_secs, verify_signed_request, SignatureScheme, SigningSecrets};
use crate::types::{RuntimeTag, SendResult, VerificationResult};

/// Direct HTTP transport that signs each request with a shared secret.
///
/// Outbound requests are signed with the current secret. Inbound
/// requests verify against the current and the next secret.
#[derive(Debug, Clone)]
pub struct SignedAdapter {
    client: reqwest::Client,
    secrets: SigningSecrets,
    scheme: SignatureScheme,
}

impl SignedAdapter {
    pub fn new(secrets: SigningSecrets) -> Self {
        Self {
            client: reqwest::Client::new(),
            secrets,
            scheme: SignatureScheme::default(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }
}

#[async_trait]
impl Adapter for SignedAdapter {
    async fn verify(
        &self,
        request: &Request<Bytes>,
        _raw_body: &str,
        runtime: RuntimeTag,
    ) -> VerificationResult {
        match verify_signed_request(request, &self.secrets, &self.scheme, now_secs()) {
            Ok(()) => VerificationResult::authentic(),
            Err(err) => {
                tracing::debug!(%runtime, reason = %err, "signed request rejected");
                VerificationResult::rejected(err.to_string())
            }
        }
    }

    async fn send(&self, url: &Url, payload: &Value, runtime: RuntimeTag) -> SendResult {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(err) => return SendResult::failed(format!("could not serialize payload: {err}")),
        };
        let timestamp = now_secs().to_string();
        let signature = compute_signature(&self.secrets.current, &body, &timestamp);

        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(self.scheme.signature_header.as_str(), signature)
            .header(self.scheme.timestamp_header.as_str(), timestamp.as_str())
            .body(body)
            .send()
            .await;

        match response.and_then(|resp| resp.error_for_status()) {
            Ok(_) => {
                tracing::debug!(%url, %runtime, "signed POST delivered");
                SendResult::delivered(format!("POST to {url} succeeded"), Some(timestamp))
            }
            Err(err) => {
                tracing::warn!(%url, %runtime, error = %err, "signed POST failed");
                SendResult::failed(format!("POST to {url} failed: {err}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

    #[tokio::test]
    async fn verifies_its_own_signatures() {
        let adapter = SignedAdapter::new(SigningSecrets::new("s3cret"));
        let body = r#"{"name":"sarim"}"#;
        let timestamp = now_secs().to_string();
        let signature = compute_signature(b"s3cret", body.as_bytes(), &timestamp);

        let request = Request::post("/jobs/email")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, timestamp)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();

        let result = adapter.verify(&request, body, RuntimeTag::ServerProcess).await;
        assert!(result.authentic);
    }

    #[tokio::test]
    async fn binary_bodies_verify_over_exact_bytes() {
        let adapter = SignedAdapter::new(SigningSecrets::new("s3cret"));
        let body: &'static [u8] = &[0xff, 0xfe, 0x00, 0x80, b'{'];
        let timestamp = now_secs().to_string();
        let signature = compute_signature(b"s3cret", body, &timestamp);

        let request = Request::post("/jobs/upload")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, timestamp)
            .body(Bytes::from_static(body))
            .unwrap();

        let lossy = String::from_utf8_lossy(body);
        let result = adapter.verify(&request, &lossy, RuntimeTag::ServerProcess).await;
        assert!(result.authentic, "{:?}", result.reason);
    }

    #[tokio::test]
    async fn missing_signature_is_reported() {
        let adapter = SignedAdapter::new(SigningSecrets::new("s3cret"));
        let request = Request::post("/jobs/email").body(Bytes::new()).unwrap();
        let result = adapter.verify(&request, "", RuntimeTag::Edge).await;
        assert_eq!(result, VerificationResult::rejected("signature missing"));
    }
}
