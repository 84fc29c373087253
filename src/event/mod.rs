//! Event types emitted by the request executor and topology manager. These exist purely for
//! observability: a caller-supplied handler, or the built-in `tracing` bridge in [`crate::trace`],
//! can be notified without the core logic depending on any particular logging backend.

pub mod request;
pub mod topology;

use std::sync::Arc;

pub use request::{RequestEvent, RequestEventHandler};
pub use topology::{TopologyEvent, TopologyEventHandler};

/// Emits an event to both a user-supplied handler and the built-in tracing handler, if either is
/// present.
pub(crate) fn emit_request_event(
    user: Option<&Arc<dyn RequestEventHandler>>,
    tracing: Option<&Arc<dyn RequestEventHandler>>,
    generate: impl Fn() -> RequestEvent,
) {
    if user.is_none() && tracing.is_none() {
        return;
    }
    let event = generate();
    if let Some(handler) = user {
        handler.handle(event.clone());
    }
    if let Some(handler) = tracing {
        handler.handle(event);
    }
}

pub(crate) fn emit_topology_event(
    user: Option<&Arc<dyn TopologyEventHandler>>,
    tracing: Option<&Arc<dyn TopologyEventHandler>>,
    generate: impl Fn() -> TopologyEvent,
) {
    if user.is_none() && tracing.is_none() {
        return;
    }
    let event = generate();
    if let Some(handler) = user {
        handler.handle(event.clone());
    }
    if let Some(handler) = tracing {
        handler.handle(event);
    }
}
