use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::error::ConfigError;
use crate::scheduler::JobDescriptor;
use crate::telemetry::metric_inc_route;
use crate::types::SendOutcome;

/// Message returned when a payload fails its schema before sending.
pub const INVALID_PAYLOAD_MESSAGE: &str = "could not validate payload";

/// Deliver `payload` to the job's receive endpoint.
///
/// A missing or unusable base URL is a configuration error and fails
/// before anything else. A payload rejected by the schema never reaches
/// the adapter. Whatever the adapter reports is returned as is.
pub async fn send<JP, JR>(
    descriptor: &JobDescriptor<JP, JR>,
    config: &SchedulerConfig,
    payload: &JP,
) -> Result<SendOutcome, ConfigError>
where
    JP: Serialize,
{
    let route = descriptor.route();
    let url = config.resolve_url(route)?;

    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(route, error = %err, "payload could not be serialized");
            metric_inc_route("jobs.send.invalid_payload", route);
            return Ok(SendOutcome::failed(format!("could not serialize payload: {err}")));
        }
    };

    if let Some(schema) = descriptor.schema() {
        if let Err(err) = schema.validate(&value) {
            tracing::warn!(route, error = %err, "payload rejected before send");
            metric_inc_route("jobs.send.invalid_payload", route);
            return Ok(SendOutcome::failed(INVALID_PAYLOAD_MESSAGE));
        }
    }

    let result = descriptor
        .adapter()
        .send(&url, &value, config.runtime())
        .await;

    if result.delivered {
        tracing::info!(route, %url, message_id = result.id.as_deref().unwrap_or(""), "job sent");
        metric_inc_route("jobs.send.delivered", route);
    } else {
        tracing::warn!(route, %url, message = %result.message, "job send failed");
        metric_inc_route("jobs.send.failed", route);
    }

    Ok(result.into())
}
