use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::adapter::Adapter;
use crate::basic::BasicAdapter;
use crate::config::SchedulerConfig;
use crate::dispatch::{Handler, Pipeline};
use crate::error::ConfigError;
use crate::job::Job;
use crate::schema::PayloadSchema;
use crate::send;
use crate::types::SendOutcome;

/// One schedulable job: where it is received, how its payload is checked,
/// and which transport carries it.
///
/// `JP` is the payload type, `JR` what the job returns. A descriptor is
/// immutable once built and is usually created once at startup.
pub struct JobDescriptor<JP, JR> {
    route: String,
    schema: Option<Arc<dyn PayloadSchema>>,
    adapter: Arc<dyn Adapter>,
    _types: PhantomData<fn(JP) -> JR>,
}

impl<JP, JR> JobDescriptor<JP, JR> {
    /// Create a descriptor for `route`, using [`BasicAdapter`] until
    /// another adapter is supplied.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            schema: None,
            adapter: Arc::new(BasicAdapter::new()),
            _types: PhantomData,
        }
    }

    /// Validate payloads on both the send and the receive side.
    pub fn with_schema(mut self, schema: impl PayloadSchema + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn with_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapter = Arc::new(adapter);
        self
    }

    /// Share one adapter between several descriptors.
    pub fn with_shared_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn schema(&self) -> Option<&Arc<dyn PayloadSchema>> {
        self.schema.as_ref()
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Send a payload to this job's receive handler.
    pub async fn send(&self, config: &SchedulerConfig, payload: &JP) -> Result<SendOutcome, ConfigError>
    where
        JP: Serialize,
    {
        send::send(self, config, payload).await
    }
}

impl<JP, JR> JobDescriptor<JP, JR>
where
    JP: DeserializeOwned + Send + 'static,
    JR: Serialize + Send + 'static,
{
    /// Build the receive pipeline for `job`.
    pub fn pipeline<J>(&self, config: &SchedulerConfig, job: J) -> Pipeline<JP, JR>
    where
        J: Job<JP, JR> + 'static,
    {
        Pipeline::new(self, config, job)
    }

    /// Build the receive handler for `job`, picking the runtime arm now.
    pub fn on_receive<J>(&self, config: &SchedulerConfig, job: J) -> Handler<JP, JR>
    where
        J: Job<JP, JR> + 'static,
    {
        Handler::new(self.pipeline(config, job))
    }
}

impl<JP, JR> Clone for JobDescriptor<JP, JR> {
    fn clone(&self) -> Self {
        Self {
            route: self.route.clone(),
            schema: self.schema.clone(),
            adapter: Arc::clone(&self.adapter),
            _types: PhantomData,
        }
    }
}

impl<JP, JR> fmt::Debug for JobDescriptor<JP, JR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("route", &self.route)
            .field("has_schema", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}
