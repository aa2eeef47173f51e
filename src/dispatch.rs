use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use http::{Method, Request, Response};
use http_body::Body;
use http_body_util::Full;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::adapter::Adapter;
use crate::body::{self, ExtractedBody, ReadStrategy};
use crate::config::SchedulerConfig;
use crate::envelope::{empty_response, Outcome, Reply};
use crate::error::JobError;
use crate::job::{Job, JobContext};
use crate::schema::PayloadSchema;
use crate::scheduler::JobDescriptor;
use crate::telemetry::metric_inc_outcome;
use crate::types::{RuntimeTag, VerificationPolicy};

/// A receive handler: turns one inbound request into one response.
#[async_trait]
pub trait DispatchPipeline: Send + Sync {
    async fn dispatch<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Display + Send;
}

/// The receive-side state machine shared by the server and edge arms.
///
/// Steps run in a fixed order and each may end the dispatch: method
/// check, body extraction, verification, payload validation, job.
pub struct Pipeline<JP, JR> {
    route: String,
    schema: Option<Arc<dyn PayloadSchema>>,
    adapter: Arc<dyn Adapter>,
    job: Arc<dyn Job<JP, JR>>,
    runtime: RuntimeTag,
    trust_localhost: bool,
}

impl<JP, JR> Pipeline<JP, JR>
where
    JP: DeserializeOwned + Send + 'static,
    JR: Serialize + Send + 'static,
{
    pub fn new<J>(descriptor: &JobDescriptor<JP, JR>, config: &SchedulerConfig, job: J) -> Self
    where
        J: Job<JP, JR> + 'static,
    {
        let trust_localhost = config.verification_policy() == VerificationPolicy::TrustLocalhost
            && config.is_localhost();

        Self {
            route: descriptor.route().to_string(),
            schema: descriptor.schema().cloned(),
            adapter: descriptor.adapter().clone(),
            job: Arc::new(job),
            runtime: config.runtime(),
            trust_localhost,
        }
    }

    pub fn runtime(&self) -> RuntimeTag {
        self.runtime
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Run one dispatch, buffering the body in one read.
    pub async fn run<B>(&self, request: Request<B>) -> Reply<JR>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        self.run_with(request, ReadStrategy::Buffered).await
    }

    pub(crate) async fn run_with<B>(&self, request: Request<B>, strategy: ReadStrategy) -> Reply<JR>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let outcome = self.process(request, strategy).await;
        self.record(&outcome);
        outcome.into_reply()
    }

    async fn process<B>(&self, request: Request<B>, strategy: ReadStrategy) -> Outcome<JR>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        if request.method() != Method::POST {
            return Outcome::MethodNotAllowed;
        }

        let (request, extracted) = body::extract(request, strategy).await;

        if let Err(reason) = self.verify(&request, &extracted).await {
            return Outcome::VerificationFailed { reason };
        }

        let payload = match self.validate(&extracted) {
            Ok(payload) => payload,
            Err(detail) => return Outcome::ValidationFailed { detail },
        };

        let ctx = JobContext { payload, request };
        match AssertUnwindSafe(self.job.run(ctx)).catch_unwind().await {
            Ok(Ok(response)) => Outcome::Succeeded(response),
            Ok(Err(err)) => Outcome::JobFailed {
                message: err.message_or_fallback().to_string(),
            },
            Err(panic) => Outcome::JobFailed {
                message: JobError::from_panic(panic).message_or_fallback().to_string(),
            },
        }
    }

    /// Browser requests come from same-origin calling code and skip the
    /// adapter entirely.
    async fn verify(&self, request: &Request<Bytes>, extracted: &ExtractedBody) -> Result<(), Option<String>> {
        if self.runtime == RuntimeTag::Browser {
            return Ok(());
        }
        if self.trust_localhost {
            tracing::debug!(route = %self.route, "verification skipped for localhost");
            return Ok(());
        }

        let result = self
            .adapter
            .verify(request, &extracted.raw_body, self.runtime)
            .await;
        if result.authentic {
            Ok(())
        } else {
            Err(result.reason)
        }
    }

    fn validate(&self, extracted: &ExtractedBody) -> Result<JP, String> {
        if let Some(schema) = &self.schema {
            let value = extracted.parsed_body.as_ref().unwrap_or(&Value::Null);
            schema.validate(value).map_err(|err| err.to_string())?;
        }
        extracted.payload::<JP>().map_err(|err| err.to_string())
    }

    fn record(&self, outcome: &Outcome<JR>) {
        let route = self.route.as_str();
        let runtime = self.runtime.as_str();
        let kind = outcome.kind();
        match outcome {
            Outcome::MethodNotAllowed => {
                tracing::debug!(route, runtime, outcome = kind, "rejected non-POST request");
            }
            Outcome::VerificationFailed { reason } => {
                tracing::warn!(
                    route,
                    runtime,
                    outcome = kind,
                    reason = reason.as_deref().unwrap_or("unspecified"),
                    "request verification failed"
                );
            }
            Outcome::ValidationFailed { detail } => {
                tracing::warn!(route, runtime, outcome = kind, %detail, "payload validation failed");
            }
            Outcome::JobFailed { message } => {
                tracing::error!(route, runtime, outcome = kind, %message, "job failed");
            }
            Outcome::Succeeded(_) => {
                tracing::info!(route, runtime, outcome = kind, "job finished");
            }
        }
        metric_inc_outcome("jobs.dispatch", route, kind);
    }
}

/// Server-process arm: drains the body frame by frame.
pub struct ServerHandler<JP, JR> {
    pipeline: Arc<Pipeline<JP, JR>>,
}

/// Edge arm: collects the fetch-style body in one go.
pub struct EdgeHandler<JP, JR> {
    pipeline: Arc<Pipeline<JP, JR>>,
}

/// Browser arm: no network I/O, always an empty response.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

#[async_trait]
impl<JP, JR> DispatchPipeline for ServerHandler<JP, JR>
where
    JP: DeserializeOwned + Send + 'static,
    JR: Serialize + Send + 'static,
{
    async fn dispatch<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Display + Send,
    {
        self.pipeline
            .run_with(request, ReadStrategy::Streamed)
            .await
            .into_response()
    }
}

#[async_trait]
impl<JP, JR> DispatchPipeline for EdgeHandler<JP, JR>
where
    JP: DeserializeOwned + Send + 'static,
    JR: Serialize + Send + 'static,
{
    async fn dispatch<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Display + Send,
    {
        self.pipeline
            .run_with(request, ReadStrategy::Buffered)
            .await
            .into_response()
    }
}

#[async_trait]
impl DispatchPipeline for NoopHandler {
    async fn dispatch<B>(&self, _request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Display + Send,
    {
        empty_response()
    }
}

/// Receive handler for one job, with its runtime arm chosen once at
/// construction.
pub enum Handler<JP, JR> {
    Server(ServerHandler<JP, JR>),
    Edge(EdgeHandler<JP, JR>),
    Browser(NoopHandler),
}

impl<JP, JR> Handler<JP, JR>
where
    JP: DeserializeOwned + Send + 'static,
    JR: Serialize + Send + 'static,
{
    pub fn new(pipeline: Pipeline<JP, JR>) -> Self {
        match pipeline.runtime() {
            RuntimeTag::ServerProcess => Handler::Server(ServerHandler {
                pipeline: Arc::new(pipeline),
            }),
            RuntimeTag::Edge => Handler::Edge(EdgeHandler {
                pipeline: Arc::new(pipeline),
            }),
            RuntimeTag::Browser => Handler::Browser(NoopHandler),
        }
    }

    pub fn runtime(&self) -> RuntimeTag {
        match self {
            Handler::Server(_) => RuntimeTag::ServerProcess,
            Handler::Edge(_) => RuntimeTag::Edge,
            Handler::Browser(_) => RuntimeTag::Browser,
        }
    }
}

#[async_trait]
impl<JP, JR> DispatchPipeline for Handler<JP, JR>
where
    JP: DeserializeOwned + Send + 'static,
    JR: Serialize + Send + 'static,
{
    async fn dispatch<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Display + Send,
    {
        match self {
            Handler::Server(handler) => handler.dispatch(request).await,
            Handler::Edge(handler) => handler.dispatch(request).await,
            Handler::Browser(handler) => handler.dispatch(request).await,
        }
    }
}

impl<JP, JR> Clone for ServerHandler<JP, JR> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<JP, JR> Clone for EdgeHandler<JP, JR> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<JP, JR> Clone for Handler<JP, JR> {
    fn clone(&self) -> Self {
        match self {
            Handler::Server(handler) => Handler::Server(handler.clone()),
            Handler::Edge(handler) => Handler::Edge(handler.clone()),
            Handler::Browser(handler) => Handler::Browser(*handler),
        }
    }
}
