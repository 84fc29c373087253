//! Topology-level events: emitted by the network state whenever a refresh is initiated or
//! completes.

/// A single topology lifecycle event.
#[derive(Clone, Debug)]
pub enum TopologyEvent {
    RefreshStarted { reason: RefreshReason },
    RefreshSucceeded { etag: String, node_count: usize },
    RefreshFailed { message: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefreshReason {
    /// Triggered explicitly by the caller.
    Manual,
    /// Triggered by a `Refresh-Topology` response header.
    ServerRequested,
}

pub trait TopologyEventHandler: Send + Sync {
    fn handle(&self, event: TopologyEvent);
}
