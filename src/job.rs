use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use http::Request;

use crate::error::JobError;

/// Input handed to a job: the typed payload and the inbound request with
/// its body already buffered.
#[derive(Debug)]
pub struct JobContext<JP> {
    pub payload: JP,
    pub request: Request<Bytes>,
}

/// An application-defined unit of work.
///
/// Any `async` closure taking a [`JobContext`] and returning
/// `Result<JR, E>` with `E: Into<JobError>` is a job.
#[async_trait]
pub trait Job<JP, JR>: Send + Sync {
    async fn run(&self, ctx: JobContext<JP>) -> Result<JR, JobError>;
}

#[async_trait]
impl<JP, JR, E, F, Fut> Job<JP, JR> for F
where
    JP: Send + 'static,
    JR: Send + 'static,
    E: Into<JobError> + Send + 'static,
    F: Fn(JobContext<JP>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<JR, E>> + Send + 'static,
{
    async fn run(&self, ctx: JobContext<JP>) -> Result<JR, JobError> {
        (self)(ctx).await.map_err(Into::into)
    }
}
