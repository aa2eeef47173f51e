//! Signed message-broker transport.
//!
//! Sends are published to the broker, which calls the destination back
//! with an `Upstash-Signature` header: an HS256 JWT whose claims bind the
//! destination URL and a SHA-256 hash of the body. Verification accepts
//! tokens signed with either the current or the next signing key so that
//! key rotation never drops in-flight messages.

use async_trait::async_trait;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use bytes::Bytes;
use hmac::Mac;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Request;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use crate::adapter::{single_header, Adapter};
use crate::config::resolve_value;
use crate::error::{ConfigError, SignatureError};
use crate::signing::{mac, now_secs};
use crate::types::{RuntimeTag, SendResult, VerificationResult};

/// Header carrying the broker's signature.
pub const SIGNATURE_HEADER: &str = "upstash-signature";

/// Default broker API endpoint.
pub const DEFAULT_API_URL: &str = "https://qstash.upstash.io";

const ISSUER: &str = "Upstash";

const TOKEN_VARS: [&str; 2] = ["QSTASH_TOKEN", "NEXT_PUBLIC_QSTASH_TOKEN"];
const CURRENT_KEY_VARS: [&str; 1] = ["QSTASH_CURRENT_SIGNING_KEY"];
const NEXT_KEY_VARS: [&str; 1] = ["QSTASH_NEXT_SIGNING_KEY"];
const API_URL_VARS: [&str; 1] = ["QSTASH_URL"];

/// Broker credentials. Each value is explicit or looked up once from the
/// environment; missing values surface when first needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QStashConfig {
    pub token: Option<String>,
    pub current_signing_key: Option<String>,
    pub next_signing_key: Option<String>,
    pub api_url: Option<String>,
}

impl QStashConfig {
    /// Fill every unset value from the process environment.
    pub fn resolve(self) -> Self {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Fill every unset value from `lookup`.
    pub fn resolve_with<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            token: resolve_value(self.token.as_deref(), &TOKEN_VARS, &lookup),
            current_signing_key: resolve_value(
                self.current_signing_key.as_deref(),
                &CURRENT_KEY_VARS,
                &lookup,
            ),
            next_signing_key: resolve_value(self.next_signing_key.as_deref(), &NEXT_KEY_VARS, &lookup),
            api_url: resolve_value(self.api_url.as_deref(), &API_URL_VARS, &lookup),
        }
    }

    fn receiver(&self) -> Result<Receiver, SignatureError> {
        let current = self
            .current_signing_key
            .clone()
            .ok_or(SignatureError::MissingKey(CURRENT_KEY_VARS[0]))?;
        let next = self
            .next_signing_key
            .clone()
            .ok_or(SignatureError::MissingKey(NEXT_KEY_VARS[0]))?;
        Ok(Receiver::new(current, next))
    }

    fn token(&self) -> Result<&str, ConfigError> {
        self.token.as_deref().ok_or(ConfigError::MissingCredential {
            name: TOKEN_VARS[0],
            hint: "set QSTASH_TOKEN or NEXT_PUBLIC_QSTASH_TOKEN, or pass it via config",
        })
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    exp: u64,
    nbf: u64,
    body: String,
}

/// Verifier for broker signatures, keyed by a rotating pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    current_signing_key: String,
    next_signing_key: String,
    clock_tolerance_secs: u64,
}

impl Receiver {
    pub fn new(current_signing_key: impl Into<String>, next_signing_key: impl Into<String>) -> Self {
        Self {
            current_signing_key: current_signing_key.into(),
            next_signing_key: next_signing_key.into(),
            clock_tolerance_secs: 0,
        }
    }

    pub fn with_clock_tolerance(mut self, secs: u64) -> Self {
        self.clock_tolerance_secs = secs;
        self
    }

    /// Verify `signature` against `body`, trying the current key first.
    ///
    /// When `url` is given the token's subject must match it.
    pub fn verify(
        &self,
        signature: &str,
        body: &[u8],
        url: Option<&str>,
        now_secs: u64,
    ) -> Result<(), SignatureError> {
        match self.verify_with_key(&self.current_signing_key, signature, body, url, now_secs) {
            Err(SignatureError::Invalid) => {
                self.verify_with_key(&self.next_signing_key, signature, body, url, now_secs)
            }
            other => other,
        }
    }

    fn verify_with_key(
        &self,
        key: &str,
        token: &str,
        body: &[u8],
        url: Option<&str>,
        now_secs: u64,
    ) -> Result<(), SignatureError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SignatureError::Invalid);
        };

        let signature = decode_segment(signature).ok_or(SignatureError::Invalid)?;
        let mut mac = mac(key.as_bytes()).ok_or(SignatureError::Invalid)?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::Invalid)?;

        let claims: Claims = decode_segment(payload)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(SignatureError::Invalid)?;

        if claims.iss != ISSUER {
            return Err(SignatureError::IssuerMismatch);
        }
        if let Some(url) = url {
            if claims.sub != url {
                return Err(SignatureError::SubjectMismatch);
            }
        }
        if now_secs > claims.exp.saturating_add(self.clock_tolerance_secs) {
            return Err(SignatureError::Expired);
        }
        if now_secs.saturating_add(self.clock_tolerance_secs) < claims.nbf {
            return Err(SignatureError::NotYetValid);
        }

        let body_hash = URL_SAFE_NO_PAD.encode(Sha256::digest(body));
        if claims.body.trim_end_matches('=') != body_hash {
            return Err(SignatureError::BodyMismatch);
        }

        Ok(())
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| URL_SAFE.decode(segment))
        .ok()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    message_id: String,
}

/// Broker-backed transport.
#[derive(Debug, Clone)]
pub struct QStashAdapter {
    client: reqwest::Client,
    config: QStashConfig,
    publish_headers: Vec<(String, String)>,
    clock_tolerance_secs: u64,
    destination: Option<String>,
}

impl QStashAdapter {
    /// Build from already-resolved credentials.
    pub fn new(config: QStashConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            publish_headers: Vec::new(),
            clock_tolerance_secs: 0,
            destination: None,
        }
    }

    /// Build with credentials taken from the process environment.
    pub fn from_env() -> Self {
        Self::new(QStashConfig::default().resolve())
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Extra header sent with every publish, e.g. `Upstash-Delay: 10s`.
    pub fn with_publish_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.publish_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_clock_tolerance(mut self, secs: u64) -> Self {
        self.clock_tolerance_secs = secs;
        self
    }

    /// Public URL the broker delivers to. When set, inbound tokens must name
    /// it as their subject; otherwise the subject is not checked.
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    fn publish_url(&self, destination: &Url) -> String {
        let api = self.config.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        format!("{}/v2/publish/{}", api.trim_end_matches('/'), destination)
    }

    async fn publish(&self, url: &Url, payload: &Value) -> Result<String, String> {
        let token = self.config.token().map_err(|err| err.to_string())?;

        let mut request = self
            .client
            .post(self.publish_url(url))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json")
            .json(payload);
        for (name, value) in &self.publish_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("broker returned {status}: {detail}"));
        }

        response
            .json::<PublishResponse>()
            .await
            .map(|body| body.message_id)
            .map_err(|err| err.to_string())
    }
}

#[async_trait]
impl Adapter for QStashAdapter {
    async fn verify(
        &self,
        request: &Request<Bytes>,
        _raw_body: &str,
        runtime: RuntimeTag,
    ) -> VerificationResult {
        let signature = match single_header(request, SIGNATURE_HEADER) {
            Ok(Some(signature)) => signature,
            Ok(None) => return VerificationResult::rejected(SignatureError::Missing.to_string()),
            Err(()) => return VerificationResult::rejected(SignatureError::Malformed.to_string()),
        };

        let receiver = match self.config.receiver() {
            Ok(receiver) => receiver.with_clock_tolerance(self.clock_tolerance_secs),
            Err(err) => {
                tracing::warn!(%runtime, reason = %err, "broker signing keys unavailable");
                return VerificationResult::rejected(err.to_string());
            }
        };

        // The inbound URI reflects the local listener, not the public URL the
        // broker signed, so the subject only comes from configuration.
        match receiver.verify(signature, request.body(), self.destination.as_deref(), now_secs()) {
            Ok(()) => VerificationResult::authentic(),
            Err(err) => {
                tracing::debug!(%runtime, reason = %err, "broker signature rejected");
                VerificationResult::rejected(err.to_string())
            }
        }
    }

    async fn send(&self, url: &Url, payload: &Value, runtime: RuntimeTag) -> SendResult {
        match self.publish(url, payload).await {
            Ok(message_id) => {
                tracing::debug!(%url, %runtime, %message_id, "published to broker");
                SendResult::delivered("POST to QStash succeeded", Some(message_id))
            }
            Err(err) => {
                tracing::warn!(%url, %runtime, error = %err, "broker publish failed");
                SendResult::failed(format!("POST to QStash failed: {err}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const NOW: u64 = 1_700_000_000;
    const URL: &str = "https://example.com/jobs/email";
    const BODY: &str = r#"{"name":"sarim"}"#;

    fn sign(key: &str, claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let mut mac = mac(key.as_bytes()).unwrap();
        mac.update(format!("{header}.{payload}").as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{header}.{payload}.{signature}")
    }

    fn claims(body: &str) -> Value {
        json!({
            "iss": "Upstash",
            "sub": URL,
            "exp": NOW + 300,
            "nbf": NOW - 10,
            "iat": NOW - 10,
            "jti": "msg_1",
            "body": URL_SAFE.encode(Sha256::digest(body.as_bytes())),
        })
    }

    #[test]
    fn accepts_current_and_next_keys() {
        let receiver = Receiver::new("k1", "k2");
        let by_current = sign("k1", claims(BODY));
        let by_next = sign("k2", claims(BODY));
        assert_eq!(receiver.verify(&by_current, BODY.as_bytes(), Some(URL), NOW), Ok(()));
        assert_eq!(receiver.verify(&by_next, BODY.as_bytes(), Some(URL), NOW), Ok(()));
    }

    #[test]
    fn rejects_unknown_key_and_garbage() {
        let receiver = Receiver::new("k1", "k2");
        let foreign = sign("k3", claims(BODY));
        assert_eq!(receiver.verify(&foreign, BODY.as_bytes(), None, NOW), Err(SignatureError::Invalid));
        assert_eq!(receiver.verify("bad", BODY.as_bytes(), None, NOW), Err(SignatureError::Invalid));
    }

    #[test]
    fn rejects_tampered_body_and_expired_tokens() {
        let receiver = Receiver::new("k1", "k2");
        let token = sign("k1", claims(BODY));
        assert_eq!(
            receiver.verify(&token, r#"{"name":"mallory"}"#.as_bytes(), None, NOW),
            Err(SignatureError::BodyMismatch)
        );
        assert_eq!(
            receiver.verify(&token, BODY.as_bytes(), None, NOW + 301),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            receiver.with_clock_tolerance(5).verify(&token, BODY.as_bytes(), None, NOW + 303),
            Ok(())
        );
        assert_eq!(
            Receiver::new("k1", "k2").verify(&token, BODY.as_bytes(), Some("https://other.example/x"), NOW),
            Err(SignatureError::SubjectMismatch)
        );
    }

    #[tokio::test]
    async fn adapter_reports_missing_and_malformed_headers() {
        let adapter = QStashAdapter::new(QStashConfig {
            current_signing_key: Some("k1".into()),
            next_signing_key: Some("k2".into()),
            ..Default::default()
        });

        let unsigned = Request::post("/jobs/email").body(Bytes::new()).unwrap();
        let result = adapter.verify(&unsigned, "", RuntimeTag::ServerProcess).await;
        assert_eq!(result, VerificationResult::rejected("signature missing"));

        let doubled = Request::post("/jobs/email")
            .header("Upstash-Signature", "a")
            .header("Upstash-Signature", "b")
            .body(Bytes::new())
            .unwrap();
        let result = adapter.verify(&doubled, "", RuntimeTag::ServerProcess).await;
        assert_eq!(result, VerificationResult::rejected("signature malformed"));
    }

    fn broker_request(uri: &str, token: String) -> Request<Bytes> {
        Request::post(uri)
            .header(SIGNATURE_HEADER, token)
            .body(Bytes::from_static(BODY.as_bytes()))
            .unwrap()
    }

    #[tokio::test]
    async fn subject_is_not_taken_from_inbound_uri() {
        let adapter = QStashAdapter::new(QStashConfig {
            current_signing_key: Some("k1".into()),
            next_signing_key: Some("k2".into()),
            ..Default::default()
        });
        let now = now_secs();
        let token = sign(
            "k1",
            json!({
                "iss": "Upstash",
                "sub": URL,
                "exp": now + 300,
                "nbf": now - 10,
                "body": URL_SAFE.encode(Sha256::digest(BODY.as_bytes())),
            }),
        );

        // Behind a proxy the listener sees its own scheme and authority.
        let internal = broker_request("http://10.0.0.5:8080/jobs/email", token.clone());
        let result = adapter.verify(&internal, BODY, RuntimeTag::ServerProcess).await;
        assert!(result.authentic, "{:?}", result.reason);

        let pinned = adapter.clone().with_destination(URL);
        let result = pinned.verify(&internal, BODY, RuntimeTag::ServerProcess).await;
        assert!(result.authentic, "{:?}", result.reason);

        let elsewhere = adapter.with_destination("https://example.com/jobs/other");
        let result = elsewhere.verify(&internal, BODY, RuntimeTag::ServerProcess).await;
        assert_eq!(result, VerificationResult::rejected(SignatureError::SubjectMismatch.to_string()));
    }

    #[tokio::test]
    async fn missing_keys_reject_instead_of_failing() {
        let adapter = QStashAdapter::new(QStashConfig::default());
        let request = Request::post("/jobs/email")
            .header("Upstash-Signature", "token")
            .body(Bytes::new())
            .unwrap();
        let result = adapter.verify(&request, "", RuntimeTag::Edge).await;
        assert!(!result.authentic);
        assert_eq!(
            result.reason.as_deref(),
            Some("signing key missing: QSTASH_CURRENT_SIGNING_KEY")
        );
    }

    #[tokio::test]
    async fn send_without_token_is_a_failed_delivery() {
        let adapter = QStashAdapter::new(QStashConfig::default());
        let url = Url::parse(URL).unwrap();
        let result = adapter.send(&url, &json!({}), RuntimeTag::ServerProcess).await;
        assert!(!result.delivered);
        assert!(result.message.contains("QSTASH_TOKEN"));
    }

    #[test]
    fn config_prefers_explicit_values() {
        let env = |name: &str| match name {
            "QSTASH_TOKEN" => Some("5678".to_string()),
            "QSTASH_CURRENT_SIGNING_KEY" => Some("env-current".to_string()),
            _ => None,
        };
        let config = QStashConfig {
            token: Some("1234".into()),
            ..Default::default()
        }
        .resolve_with(env);
        assert_eq!(config.token.as_deref(), Some("1234"));
        assert_eq!(config.current_signing_key.as_deref(), Some("env-current"));
        assert_eq!(config.next_signing_key, None);
    }

    #[test]
    fn publish_url_embeds_destination() {
        let adapter = QStashAdapter::new(QStashConfig {
            api_url: Some("https://broker.test/".into()),
            ..Default::default()
        });
        let url = Url::parse(URL).unwrap();
        assert_eq!(
            adapter.publish_url(&url),
            "https://broker.test/v2/publish/https://example.com/jobs/email"
        );
    }
}
