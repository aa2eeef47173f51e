//! Typed background jobs delivered over HTTP callbacks.
//!
//! Producer code calls `send` on a [`JobDescriptor`]; a transport
//! [`Adapter`] delivers the JSON payload to the job's route, where a
//! [`Handler`] verifies, validates and runs the job, answering with a
//! uniform [`ResponseEnvelope`].
//!
//! ## Guarantees
//! - Single-hop, at-most-once delivery per `send`
//! - Every dispatch ends in exactly one envelope with a fixed status code
//! - Job faults, including panics, never escape the handler
//! - No shared mutable state between dispatches
//!
//! ## Non-Guarantees
//! - Persistence of undelivered jobs
//! - Retries or backoff
//! - Ordering across dispatches
//!
//! ## Status table
//!
//! | outcome              | status | message                               |
//! |----------------------|--------|---------------------------------------|
//! | success              | 200    | `Job finished executing`              |
//! | wrong method         | 405    | `Only POST requests allowed`          |
//! | verification failed  | 500    | `Adapter could not verify request: …` |
//! | validation failed    | 500    | `Failed to validate request payload: …` |
//! | job failed           | 500    | the fault's message, or `Job failed to run` |

mod adapter;
mod basic;
mod body;
mod config;
mod dispatch;
mod envelope;
mod error;
mod job;
mod qstash;
mod runtime;
mod schema;
mod scheduler;
mod send;
mod signed;
mod signing;
mod telemetry;
mod types;

pub use adapter::Adapter;
pub use basic::BasicAdapter;
pub use body::{extract, is_json, ExtractedBody, ReadStrategy};
pub use config::{SchedulerConfig, SchedulerConfigBuilder, BASE_URL_VAR, DEPLOYMENT_HOST_VARS};
pub use dispatch::{DispatchPipeline, EdgeHandler, Handler, NoopHandler, Pipeline, ServerHandler};
pub use envelope::{
    Outcome, Reply, StatusMessage, JOB_FAILED, JOB_SUCCEEDED, METHOD_NOT_ALLOWED, VALIDATION_FAILED,
    VERIFICATION_FAILED,
};
pub use error::{ConfigError, JobError, SchemaError, SignatureError, JOB_FAULT_FALLBACK};
pub use job::{Job, JobContext};
pub use qstash::{QStashAdapter, QStashConfig, Receiver};
pub use runtime::{select as select_runtime, HostProbe, RuntimeProbe, EDGE_RUNTIME_VAR};
pub use schema::{JsonSchema, PayloadSchema};
pub use scheduler::JobDescriptor;
pub use send::{send, INVALID_PAYLOAD_MESSAGE};
pub use signed::SignedAdapter;
pub use signing::{
    compute_signature, is_timestamp_fresh, verify_signature, verify_signed_request, SignatureScheme,
    SigningSecrets, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use types::{
    ResponseEnvelope, RuntimeTag, SendOutcome, SendResult, VerificationPolicy, VerificationResult,
};
