use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Errors raised when required configuration is missing or unusable.
///
/// These are reported at the point the value is first needed, never
/// eagerly at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No base URL was passed and none could be inferred from the environment.
    #[error(
        "could not determine a base URL for the job endpoint; pass one via config \
         (e.g. https://example.com) or set JOBS_BASE_URL"
    )]
    MissingBaseUrl,

    /// The base URL could not be parsed.
    #[error("base URL {value:?} is not a valid URL: {reason}")]
    InvalidBaseUrl { value: String, reason: String },

    /// The route could not be joined onto the base URL.
    #[error("route {route:?} cannot be joined onto the base URL: {reason}")]
    InvalidRoute { route: String, reason: String },

    /// A transport credential is missing.
    #[error("missing credential {name}: {hint}")]
    MissingCredential { name: &'static str, hint: &'static str },
}

/// Fallback text used when a job fault carries no message.
pub const JOB_FAULT_FALLBACK: &str = "Job failed to run";

/// A fault raised by a job function.
///
/// The message is optional; the dispatch pipeline substitutes a
/// generic fallback when it is absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobError {
    message: Option<String>,
}

impl JobError {
    /// Create a fault with a message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.is_empty() { None } else { Some(message) },
        }
    }

    /// Create a fault that carries no message.
    pub fn opaque() -> Self {
        Self { message: None }
    }

    /// The fault's own message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Message text to report, falling back to [`JOB_FAULT_FALLBACK`].
    pub fn message_or_fallback(&self) -> &str {
        self.message.as_deref().unwrap_or(JOB_FAULT_FALLBACK)
    }

    /// Convert a caught panic payload into a fault.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            Self::new(*message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Self::new(message.clone())
        } else {
            Self::opaque()
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message_or_fallback())
    }
}

impl std::error::Error for JobError {}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for JobError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::new(err.to_string())
    }
}

/// Payload rejected by a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .errors.join("; "))]
pub struct SchemaError {
    pub errors: Vec<String>,
}

impl SchemaError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn single(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }
}

/// Reasons an inbound signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature missing")]
    Missing,

    #[error("signature malformed")]
    Malformed,

    #[error("signature invalid")]
    Invalid,

    #[error("timestamp missing")]
    MissingTimestamp,

    #[error("timestamp invalid")]
    InvalidTimestamp,

    #[error("timestamp stale")]
    StaleTimestamp,

    #[error("signature expired")]
    Expired,

    #[error("signature not yet valid")]
    NotYetValid,

    #[error("signature issuer mismatch")]
    IssuerMismatch,

    #[error("signature subject mismatch")]
    SubjectMismatch,

    #[error("signature body hash mismatch")]
    BodyMismatch,

    #[error("signing key missing: {0}")]
    MissingKey(&'static str),
}
