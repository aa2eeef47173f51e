use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::types::ResponseEnvelope;

/// Fixed message and status for one terminal dispatch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: &'static str,
    pub status: StatusCode,
    pub error: bool,
}

pub const METHOD_NOT_ALLOWED: StatusMessage = StatusMessage {
    message: "Only POST requests allowed",
    status: StatusCode::METHOD_NOT_ALLOWED,
    error: true,
};

pub const VERIFICATION_FAILED: StatusMessage = StatusMessage {
    message: "Adapter could not verify request",
    status: StatusCode::INTERNAL_SERVER_ERROR,
    error: true,
};

pub const VALIDATION_FAILED: StatusMessage = StatusMessage {
    message: "Failed to validate request payload",
    status: StatusCode::INTERNAL_SERVER_ERROR,
    error: true,
};

pub const JOB_FAILED: StatusMessage = StatusMessage {
    message: "Job failed to run",
    status: StatusCode::INTERNAL_SERVER_ERROR,
    error: true,
};

pub const JOB_SUCCEEDED: StatusMessage = StatusMessage {
    message: "Job finished executing",
    status: StatusCode::OK,
    error: false,
};

/// Terminal state of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<JR> {
    MethodNotAllowed,
    VerificationFailed { reason: Option<String> },
    ValidationFailed { detail: String },
    JobFailed { message: String },
    Succeeded(JR),
}

impl<JR> Outcome<JR> {
    pub fn status_message(&self) -> StatusMessage {
        match self {
            Outcome::MethodNotAllowed => METHOD_NOT_ALLOWED,
            Outcome::VerificationFailed { .. } => VERIFICATION_FAILED,
            Outcome::ValidationFailed { .. } => VALIDATION_FAILED,
            Outcome::JobFailed { .. } => JOB_FAILED,
            Outcome::Succeeded(_) => JOB_SUCCEEDED,
        }
    }

    /// Short name used as the `outcome` log field and metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::MethodNotAllowed => "method_not_allowed",
            Outcome::VerificationFailed { .. } => "verification_failed",
            Outcome::ValidationFailed { .. } => "validation_failed",
            Outcome::JobFailed { .. } => "job_failed",
            Outcome::Succeeded(_) => "succeeded",
        }
    }

    /// Shape the outcome into a status code and envelope.
    pub fn into_reply(self) -> Reply<JR> {
        let entry = self.status_message();
        let (message, job_response) = match self {
            Outcome::MethodNotAllowed => (entry.message.to_string(), None),
            Outcome::VerificationFailed { reason: Some(reason) } => {
                (format!("{}: {reason}", entry.message), None)
            }
            Outcome::VerificationFailed { reason: None } => (entry.message.to_string(), None),
            Outcome::ValidationFailed { detail } => (format!("{}: {detail}", entry.message), None),
            Outcome::JobFailed { message } => (message, None),
            Outcome::Succeeded(response) => (entry.message.to_string(), Some(response)),
        };

        Reply {
            status: entry.status,
            envelope: ResponseEnvelope {
                error: entry.error,
                message,
                job_response,
            },
        }
    }
}

/// Status code plus envelope: the whole observable result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<JR> {
    pub status: StatusCode,
    pub envelope: ResponseEnvelope<JR>,
}

impl<JR: Serialize> Reply<JR> {
    /// Render as a JSON HTTP response.
    ///
    /// If the job response cannot be serialized the reply degrades to a
    /// job failure rather than an empty or partial body.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let (status, body) = match serde_json::to_vec(&self.envelope) {
            Ok(body) => (self.status, body),
            Err(err) => {
                tracing::error!(error = %err, "job response is not serializable");
                let fallback: ResponseEnvelope<()> = ResponseEnvelope {
                    error: true,
                    message: format!("{}: response could not be serialized", JOB_FAILED.message),
                    job_response: None,
                };
                let body = serde_json::to_vec(&fallback).unwrap_or_default();
                (JOB_FAILED.status, body)
            }
        };

        json_response(status, Bytes::from(body))
    }
}

pub(crate) fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
    response
}

/// Empty response returned by browser no-op handlers.
pub(crate) fn empty_response() -> Response<Full<Bytes>> {
    Response::new(Full::new(Bytes::new()))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn status_table_is_fixed() {
        let cases: [(Outcome<()>, u16); 5] = [
            (Outcome::MethodNotAllowed, 405),
            (Outcome::VerificationFailed { reason: None }, 500),
            (Outcome::ValidationFailed { detail: "x".into() }, 500),
            (Outcome::JobFailed { message: "x".into() }, 500),
            (Outcome::Succeeded(()), 200),
        ];
        for (outcome, status) in cases {
            assert_eq!(outcome.into_reply().status.as_u16(), status);
        }
    }

    #[test]
    fn kinds_are_distinct_per_state() {
        let kinds = [
            Outcome::<()>::MethodNotAllowed.kind(),
            Outcome::<()>::VerificationFailed { reason: None }.kind(),
            Outcome::<()>::ValidationFailed { detail: String::new() }.kind(),
            Outcome::<()>::JobFailed { message: String::new() }.kind(),
            Outcome::Succeeded(()).kind(),
        ];
        assert_eq!(
            kinds,
            ["method_not_allowed", "verification_failed", "validation_failed", "job_failed", "succeeded"]
        );
    }

    #[test]
    fn only_success_carries_job_response() {
        let reply = Outcome::Succeeded(json!({"status": true})).into_reply();
        assert!(!reply.envelope.error);
        assert_eq!(reply.envelope.message, "Job finished executing");
        assert_eq!(reply.envelope.job_response, Some(json!({"status": true})));

        let reply = Outcome::<Value>::JobFailed { message: "smtp down".into() }.into_reply();
        assert!(reply.envelope.error);
        assert_eq!(reply.envelope.message, "smtp down");
        assert_eq!(reply.envelope.job_response, None);
    }

    #[test]
    fn verification_reason_is_appended() {
        let reply = Outcome::<()>::VerificationFailed {
            reason: Some("signature invalid".into()),
        }
        .into_reply();
        assert_eq!(
            reply.envelope.message,
            "Adapter could not verify request: signature invalid"
        );
    }
}
