use async_trait::async_trait;
use bytes::Bytes;
use http::Request;
use serde_json::Value;
use url::Url;

use crate::types::{RuntimeTag, SendResult, VerificationResult};

/// A pluggable transport.
///
/// `verify` checks inbound authenticity, `send` delivers outbound.
/// Neither may fail with an error: every fault is folded into the
/// returned result.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Check that an inbound request came from this transport.
    ///
    /// `raw_body` is the body as text. Signatures over the body should be
    /// checked against `request.body()`, which holds the exact bytes.
    async fn verify(
        &self,
        request: &Request<Bytes>,
        raw_body: &str,
        runtime: RuntimeTag,
    ) -> VerificationResult;

    /// Deliver a JSON payload to `url`.
    async fn send(&self, url: &Url, payload: &Value, runtime: RuntimeTag) -> SendResult;
}

/// Read a single string header.
///
/// `Err(())` when the header repeats or is not valid text.
pub(crate) fn single_header<'a>(
    request: &'a Request<Bytes>,
    name: &str,
) -> Result<Option<&'a str>, ()> {
    let mut values = request.headers().get_all(name).iter();
    let Some(first) = values.next() else {
        return Ok(None);
    };
    if values.next().is_some() {
        return Err(());
    }
    first.to_str().map(Some).map_err(|_| ())
}
