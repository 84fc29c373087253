//! Request-level events: one started/succeeded/failed triple per call made by the request
//! executor.

use std::time::Duration;

use crate::error::Error;

/// A single request lifecycle event.
#[derive(Clone, Debug)]
pub enum RequestEvent {
    Started(RequestStartedEvent),
    Succeeded(RequestSucceededEvent),
    Failed(RequestFailedEvent),
    /// Emitted when a response carried a `Refresh-Topology` header.
    TopologyRefreshRequested { node: String },
}

#[derive(Clone, Debug)]
pub struct RequestStartedEvent {
    pub node: String,
    pub database: String,
    pub method: String,
    pub url: String,
    pub request_id: u64,
}

#[derive(Clone, Debug)]
pub struct RequestSucceededEvent {
    pub node: String,
    pub database: String,
    pub request_id: u64,
    pub duration: Duration,
    pub status: u16,
}

#[derive(Clone, Debug)]
pub struct RequestFailedEvent {
    pub node: String,
    pub database: String,
    pub request_id: u64,
    pub duration: Duration,
    pub failure: Error,
    pub retryable: bool,
}

/// Implemented by anything that wants to observe request events, either the caller's own handler
/// or the built-in tracing bridge.
pub trait RequestEventHandler: Send + Sync {
    fn handle(&self, event: RequestEvent);
}
