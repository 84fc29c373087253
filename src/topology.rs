//! Network State / Topology: the current list of cluster nodes plus the etag that versions it,
//! shared read-mostly by every session of one store+database pair.
//!
//! A refresh is a `GET {base}/topology` issued through the current node's executor; concurrent
//! refreshes collapse onto a single in-flight attempt via a `futures::future::Shared` future
//! cached for the duration of the refresh, so callers racing to refresh after a `Refresh-Topology`
//! header don't each pay for their own round trip.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, RwLock},
};

use futures_util::future::{FutureExt, Shared};
use http::HeaderMap;

use crate::{
    command::{TopologyRefresh, TopologyRefreshNode, TopologyRefreshResult},
    conventions::{Conventions, RequestOptions},
    error::{Error, ErrorKind, Result},
    event::{
        request::RequestEventHandler,
        topology::{RefreshReason, TopologyEvent, TopologyEventHandler},
    },
    node::{NodeAddress, Scheme, TransportOptions},
    registry::ExecutorRegistry,
};

/// A snapshot of the topology at one point in time. Immutable once built; a refresh replaces the
/// whole snapshot rather than mutating it in place, so readers holding an `Arc` clone never see a
/// torn view: a reader never observes more or fewer nodes than existed in some single completed
/// refresh.
#[derive(Debug, Clone)]
pub(crate) struct TopologyState {
    pub etag: String,
    pub nodes: Vec<NodeAddress>,
}

type RefreshFuture = Shared<Pin<Box<dyn Future<Output = Result<()>> + Send>>>;

struct TopologyInner {
    database: String,
    transport: TransportOptions,
    conventions: Arc<Conventions>,
    state: RwLock<Arc<TopologyState>>,
    selector: crate::selector::NodeSelector,
    in_flight_refresh: std::sync::Mutex<Option<RefreshFuture>>,
    user_handler: Option<Arc<dyn TopologyEventHandler>>,
    tracing_handler: Arc<dyn TopologyEventHandler>,
    request_handler: Option<Arc<dyn RequestEventHandler>>,
}

/// A cheap, `Clone`-able handle to one store+database's topology.
#[derive(Clone)]
pub(crate) struct Topology(Arc<TopologyInner>);

impl Topology {
    pub(crate) fn new(
        database: impl Into<String>,
        seed_nodes: Vec<NodeAddress>,
        transport: TransportOptions,
        conventions: Arc<Conventions>,
        user_handler: Option<Arc<dyn TopologyEventHandler>>,
        request_handler: Option<Arc<dyn RequestEventHandler>>,
    ) -> Self {
        let state = TopologyState {
            etag: String::new(),
            nodes: seed_nodes,
        };
        Self(Arc::new(TopologyInner {
            database: database.into(),
            transport,
            conventions,
            state: RwLock::new(Arc::new(state)),
            selector: crate::selector::NodeSelector::new(),
            in_flight_refresh: std::sync::Mutex::new(None),
            user_handler,
            tracing_handler: Arc::new(crate::trace::TopologyTracingEventEmitter),
            request_handler,
        }))
    }

    /// A point-in-time snapshot of the current nodes and etag.
    pub(crate) fn snapshot(&self) -> Arc<TopologyState> {
        self.0.state.read().expect("topology lock poisoned").clone()
    }

    pub(crate) fn conventions(&self) -> &Arc<Conventions> {
        &self.0.conventions
    }

    pub(crate) fn transport(&self) -> &TransportOptions {
        &self.0.transport
    }

    /// The node the selector currently favors. Errors if the topology holds no nodes at all
    /// (a store cannot be created with an empty seed list, but a pathological refresh could in
    /// principle report zero nodes; guarded here rather than panicking on an empty index).
    pub(crate) fn current_node(&self) -> Result<NodeAddress> {
        let snapshot = self.snapshot();
        if snapshot.nodes.is_empty() {
            return Err(Error::new(ErrorKind::NoNodesAvailable));
        }
        Ok(self.0.selector.current_node(&snapshot.nodes).clone())
    }

    /// Advances the selector past the node at `failed_index` modulo the current node count.
    pub(crate) fn on_node_failure(&self) {
        let count = self.snapshot().nodes.len();
        self.0.selector.on_failure(count);
    }

    /// Etag to stamp on the `Topology-Etag` header, unless conventions disable topology updates.
    pub(crate) fn etag_for_header(&self) -> Option<String> {
        if self.0.conventions.disable_topology_update {
            None
        } else {
            let etag = self.snapshot().etag;
            if etag.is_empty() {
                None
            } else {
                Some(etag)
            }
        }
    }

    /// Triggers a refresh and forgets about it — used when a response carries `Refresh-Topology`.
    /// Errors are logged through the topology event handler, not surfaced to the request that
    /// triggered them.
    pub(crate) fn trigger_refresh(&self, executors: Arc<ExecutorRegistry>) {
        if self.0.conventions.disable_topology_update {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            let _ = this.refresh(RefreshReason::ServerRequested, &executors).await;
        });
    }

    /// Fetches the topology from the current node and swaps it in atomically. Concurrent callers
    /// collapse onto one in-flight attempt.
    pub(crate) async fn refresh(&self, reason: RefreshReason, executors: &Arc<ExecutorRegistry>) -> Result<()> {
        let fut = {
            let mut guard = self.0.in_flight_refresh.lock().expect("refresh lock poisoned");
            if let Some(existing) = &*guard {
                existing.clone()
            } else {
                let this = self.clone();
                let executors = executors.clone();
                let boxed: Pin<Box<dyn Future<Output = Result<()>> + Send>> =
                    Box::pin(async move { this.do_refresh(reason, &executors).await });
                let shared = boxed.shared();
                *guard = Some(shared.clone());
                shared
            }
        };

        let result = fut.await;
        *self.0.in_flight_refresh.lock().expect("refresh lock poisoned") = None;
        result
    }

    async fn do_refresh(&self, reason: RefreshReason, executors: &ExecutorRegistry) -> Result<()> {
        self.emit_topology(TopologyEvent::RefreshStarted { reason });

        let node = self.current_node()?;
        let executor = executors
            .get_or_start(&node, &self.0.transport, &self.0.conventions, self.0.request_handler.as_ref())
            .await
            .map_err(|e| {
                self.emit_topology(TopologyEvent::RefreshFailed { message: e.to_string() });
                e
            })?;

        let refresh_trigger: crate::executor::RefreshTrigger = Arc::new(|| {});
        let response = executor
            .request(&TopologyRefresh, HeaderMap::new(), RequestOptions::default(), None, &refresh_trigger)
            .await
            .map_err(|e| {
                self.emit_topology(TopologyEvent::RefreshFailed { message: e.to_string() });
                e
            })?;

        let parsed: TopologyRefreshResult = serde_json::from_value(response.body).map_err(|e| {
            let err = Error::invalid_response_payload(e.to_string());
            self.emit_topology(TopologyEvent::RefreshFailed { message: err.to_string() });
            err
        })?;

        let nodes = parsed
            .nodes
            .iter()
            .map(|n| parse_node(n, &self.0.database))
            .collect::<Result<Vec<_>>>()?;

        let node_count = nodes.len();
        let new_state = Arc::new(TopologyState {
            etag: parsed.etag.clone(),
            nodes,
        });
        *self.0.state.write().expect("topology lock poisoned") = new_state;

        self.emit_topology(TopologyEvent::RefreshSucceeded {
            etag: parsed.etag,
            node_count,
        });

        Ok(())
    }

    fn emit_topology(&self, event: TopologyEvent) {
        crate::event::emit_topology_event(self.0.user_handler.as_ref(), Some(&self.0.tracing_handler), || {
            event.clone()
        });
    }
}

/// Parses a topology response's `"Url"` (`scheme://host:port`) plus `"Database"`/`"ClusterTag"`
/// into a [`NodeAddress`]. The server always reports a concrete database name per node, but we
/// fall back to the topology's own database if a future server version omits it.
fn parse_node(raw: &TopologyRefreshNode, database: &str) -> Result<NodeAddress> {
    let uri: http::Uri = raw.url.parse().map_err(|_| {
        Error::invalid_response_payload(format!("topology reported an invalid node url: {}", raw.url))
    })?;

    let scheme = match uri.scheme_str() {
        Some("https") => Scheme::Https,
        Some("http") | None => Scheme::Http,
        Some(other) => {
            return Err(Error::invalid_response_payload(format!(
                "topology reported an unsupported scheme: {other}"
            )))
        }
    };

    let host = uri
        .host()
        .ok_or_else(|| Error::invalid_response_payload(format!("topology node url has no host: {}", raw.url)))?
        .to_string();
    let port = uri.port_u16().unwrap_or(match scheme {
        Scheme::Https => 443,
        Scheme::Http => 80,
    });

    let db = if raw.database.is_empty() {
        database.to_string()
    } else {
        raw.database.clone()
    };

    let mut node = NodeAddress::new(scheme, host, port, db);
    node.cluster_tag = raw.cluster_tag.clone();
    Ok(node)
}
