use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution context a handler runs under.
///
/// Fixed when a handler is constructed and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeTag {
    /// A long-lived server process that owns its sockets.
    ServerProcess,

    /// An isolated edge runtime with fetch-style requests.
    Edge,

    /// Browser code. Receive handlers are no-ops here.
    Browser,
}

impl RuntimeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeTag::ServerProcess => "server-process",
            RuntimeTag::Edge => "edge",
            RuntimeTag::Browser => "browser",
        }
    }
}

impl fmt::Display for RuntimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an adapter's inbound authenticity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub authentic: bool,
    pub reason: Option<String>,
}

impl VerificationResult {
    pub fn authentic() -> Self {
        Self {
            authentic: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            authentic: false,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of an adapter's outbound delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub delivered: bool,
    pub message: String,

    /// Transport-assigned identifier for the delivered message.
    pub id: Option<String>,
}

impl SendResult {
    pub fn delivered(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            delivered: true,
            message: message.into(),
            id,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            delivered: false,
            message: message.into(),
            id: None,
        }
    }
}

/// Result handed back to the code that called `send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl SendOutcome {
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            message_id: None,
        }
    }
}

impl From<SendResult> for SendOutcome {
    fn from(result: SendResult) -> Self {
        Self {
            error: !result.delivered,
            message: result.message,
            message_id: result.id,
        }
    }
}

/// Uniform body returned by every receive invocation.
///
/// `job_response` is present iff `error` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<JR> {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_response: Option<JR>,
}

/// Verification behaviour for inbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationPolicy {
    /// Every request goes through the adapter's `verify`.
    #[default]
    Always,

    /// Skip verification when the configured base URL points at the local host.
    TrustLocalhost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_job_response() {
        let envelope: ResponseEnvelope<()> = ResponseEnvelope {
            error: true,
            message: "Only POST requests allowed".into(),
            job_response: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": true, "message": "Only POST requests allowed"})
        );
    }

    #[test]
    fn envelope_deserializes_without_default_job_response() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Sent {
            status: bool,
        }

        let ok: ResponseEnvelope<Sent> = serde_json::from_str(
            r#"{"error":false,"message":"Job finished executing","jobResponse":{"status":true}}"#,
        )
        .unwrap();
        assert_eq!(ok.job_response, Some(Sent { status: true }));

        let failed: ResponseEnvelope<Sent> =
            serde_json::from_str(r#"{"error":true,"message":"Job failed to run"}"#).unwrap();
        assert!(failed.error);
        assert_eq!(failed.job_response, None);
    }

    #[test]
    fn send_outcome_uses_message_id_key() {
        let outcome = SendOutcome::from(SendResult::delivered("ok", Some("msg_1".into())));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": false, "message": "ok", "messageId": "msg_1"})
        );
    }
}
