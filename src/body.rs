use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Request};
use http_body::Body;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::telemetry::metric_inc;

/// Raw text and parsed JSON form of one request body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedBody {
    /// Body decoded as UTF-8 (lossy).
    pub raw_body: String,

    /// Parsed JSON, present only for `application/json` bodies that parse.
    pub parsed_body: Option<Value>,
}

impl ExtractedBody {
    /// Build both forms from already-buffered bytes.
    pub fn from_bytes(headers: &HeaderMap, bytes: &[u8]) -> Self {
        let raw_body = String::from_utf8_lossy(bytes).into_owned();
        let parsed_body = if is_json(headers) {
            serde_json::from_slice(bytes).ok()
        } else {
            None
        };

        Self {
            raw_body,
            parsed_body,
        }
    }

    /// Deserialize the parsed body, treating an absent body as JSON `null`.
    pub fn payload<JP: DeserializeOwned>(&self) -> Result<JP, serde_json::Error> {
        match &self.parsed_body {
            Some(value) => JP::deserialize(value),
            None => JP::deserialize(Value::Null),
        }
    }
}

/// How the body stream is drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Pull frame by frame, as a server process reads its socket.
    Streamed,

    /// Collect the whole body at once, as fetch-style runtimes do.
    Buffered,
}

/// Read the body exactly once and hand back the request with its body
/// buffered, plus the raw and parsed forms.
///
/// A failed read or unparsable JSON never aborts extraction; they show
/// up as an empty raw body or an absent parsed body.
pub async fn extract<B>(request: Request<B>, strategy: ReadStrategy) -> (Request<Bytes>, ExtractedBody)
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = request.into_parts();

    let bytes = match read_body(body, strategy).await {
        Ok(bytes) => bytes,
        Err(reason) => {
            tracing::warn!(%reason, "failed to read request body");
            metric_inc("jobs.body.read_failed");
            Bytes::new()
        }
    };

    let extracted = ExtractedBody::from_bytes(&parts.headers, &bytes);
    (Request::from_parts(parts, bytes), extracted)
}

async fn read_body<B>(body: B, strategy: ReadStrategy) -> Result<Bytes, String>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    match strategy {
        ReadStrategy::Buffered => body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|err| err.to_string()),
        ReadStrategy::Streamed => {
            let mut body = std::pin::pin!(body);
            let mut buf = BytesMut::new();
            while let Some(frame) = body.frame().await {
                let frame = frame.map_err(|err| err.to_string())?;
                if let Ok(data) = frame.into_data() {
                    buf.extend_from_slice(&data);
                }
            }
            Ok(buf.freeze())
        }
    }
}

/// Whether the declared content type is `application/json`.
///
/// Parameters such as `charset` are ignored.
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}
