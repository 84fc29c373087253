//! Bridges [`crate::event`] events into `tracing`. Kept deliberately small: one emitter per event
//! family, one tracing target per family.

use crate::event::{
    request::{RequestEvent, RequestEventHandler},
    topology::{TopologyEvent, TopologyEventHandler},
};

pub(crate) const REQUEST_TRACING_EVENT_TARGET: &str = "ravendb::request";
pub(crate) const TOPOLOGY_TRACING_EVENT_TARGET: &str = "ravendb::topology";

/// Emits request events (started/succeeded/failed/topology-refresh-requested) as `tracing`
/// events at debug level.
#[derive(Default)]
pub(crate) struct RequestTracingEventEmitter;

impl RequestEventHandler for RequestTracingEventEmitter {
    fn handle(&self, event: RequestEvent) {
        match event {
            RequestEvent::Started(e) => {
                tracing::debug!(
                    target: REQUEST_TRACING_EVENT_TARGET,
                    node = e.node.as_str(),
                    database = e.database.as_str(),
                    method = e.method.as_str(),
                    url = e.url.as_str(),
                    request_id = e.request_id,
                    "request started"
                );
            }
            RequestEvent::Succeeded(e) => {
                tracing::debug!(
                    target: REQUEST_TRACING_EVENT_TARGET,
                    node = e.node.as_str(),
                    database = e.database.as_str(),
                    request_id = e.request_id,
                    status = e.status,
                    duration_ms = e.duration.as_millis() as u64,
                    "request succeeded"
                );
            }
            RequestEvent::Failed(e) => {
                tracing::debug!(
                    target: REQUEST_TRACING_EVENT_TARGET,
                    node = e.node.as_str(),
                    database = e.database.as_str(),
                    request_id = e.request_id,
                    retryable = e.retryable,
                    duration_ms = e.duration.as_millis() as u64,
                    failure = %e.failure,
                    "request failed"
                );
            }
            RequestEvent::TopologyRefreshRequested { node } => {
                tracing::debug!(
                    target: REQUEST_TRACING_EVENT_TARGET,
                    node = node.as_str(),
                    "server requested a topology refresh"
                );
            }
        }
    }
}

/// Emits topology events at debug level.
#[derive(Default)]
pub(crate) struct TopologyTracingEventEmitter;

impl TopologyEventHandler for TopologyTracingEventEmitter {
    fn handle(&self, event: TopologyEvent) {
        match event {
            TopologyEvent::RefreshStarted { reason } => {
                tracing::debug!(
                    target: TOPOLOGY_TRACING_EVENT_TARGET,
                    reason = ?reason,
                    "topology refresh started"
                );
            }
            TopologyEvent::RefreshSucceeded { etag, node_count } => {
                tracing::debug!(
                    target: TOPOLOGY_TRACING_EVENT_TARGET,
                    etag = etag.as_str(),
                    node_count,
                    "topology refresh succeeded"
                );
            }
            TopologyEvent::RefreshFailed { message } => {
                tracing::warn!(
                    target: TOPOLOGY_TRACING_EVENT_TARGET,
                    message = message.as_str(),
                    "topology refresh failed"
                );
            }
        }
    }
}

/// When the `log-compat` feature is enabled, request-failure events are additionally reflected
/// through the `log` facade so applications which only listen on `log` (rather than `tracing`)
/// still observe driver activity. No-op otherwise.
#[cfg(feature = "log-compat")]
pub(crate) fn log_compat_failure(message: &str) {
    log::debug!(target: "ravendb::request", "{}", message);
}

#[cfg(not(feature = "log-compat"))]
pub(crate) fn log_compat_failure(_message: &str) {}
