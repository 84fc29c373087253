//! Store: the top-level handle a caller holds — a small `Clone`-able front door (`Store`) around
//! an `Arc`-shared inner state, so callers can freely clone a handle and open many concurrent
//! sessions against it.

use std::sync::Arc;

use derivative::Derivative;
use http::HeaderMap;
use uuid::Uuid;

use crate::{
    command::Command,
    conventions::{Conventions, RequestOptions},
    error::{Error, ErrorKind, Result},
    event::{request::RequestEventHandler, topology::TopologyEventHandler},
    executor::RawResponse,
    node::{NodeAddress, Scheme, TransportOptions},
    registry::{ExecutorRegistry, SessionRegistry},
    session::Session,
    topology::Topology,
};

#[derive(Derivative)]
#[derivative(Debug)]
struct StoreInner {
    database: String,
    #[derivative(Debug = "ignore")]
    topology: Topology,
    #[derivative(Debug = "ignore")]
    executors: Arc<ExecutorRegistry>,
    #[derivative(Debug = "ignore")]
    sessions: Arc<SessionRegistry<()>>,
    conventions: Arc<Conventions>,
    #[derivative(Debug = "ignore")]
    request_handler: Option<Arc<dyn RequestEventHandler>>,
}

/// A handle to one document store, bound to one database and one set of seed/cluster nodes.
/// Cheap to clone; every clone shares the same topology, executors, and session registry.
#[derive(Clone, Debug)]
pub struct Store(Arc<StoreInner>);

impl Store {
    /// Builds a store from a list of seed node URLs (`scheme://host[:port]`) and opens no
    /// connections yet — executors are started lazily on first use.
    pub fn new<S: AsRef<str>>(
        urls: &[S],
        database: impl Into<String>,
        conventions: Conventions,
        transport: TransportOptions,
        request_handler: Option<Arc<dyn RequestEventHandler>>,
        topology_handler: Option<Arc<dyn TopologyEventHandler>>,
    ) -> Result<Self> {
        let database = database.into();
        let seed_nodes = urls
            .iter()
            .map(|url| parse_seed_url(url.as_ref(), &database))
            .collect::<Result<Vec<_>>>()?;

        if seed_nodes.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument {
                message: "at least one seed node url is required".to_string(),
            }));
        }

        let conventions = Arc::new(conventions);
        let topology = Topology::new(
            database.clone(),
            seed_nodes,
            transport,
            conventions.clone(),
            topology_handler,
            request_handler.clone(),
        );

        Ok(Self(Arc::new(StoreInner {
            database,
            topology,
            executors: Arc::new(ExecutorRegistry::new()),
            sessions: Arc::new(SessionRegistry::new()),
            conventions,
            request_handler,
        })))
    }

    pub fn database(&self) -> &str {
        &self.0.database
    }

    pub(crate) fn conventions(&self) -> Arc<Conventions> {
        self.0.conventions.clone()
    }

    /// Opens a new session, registering it in the session directory under a freshly generated id.
    pub async fn open_session(&self) -> Session {
        let id = Uuid::new_v4().to_string();
        self.0.sessions.register(id.clone(), ()).await;
        Session::new(id, self.clone())
    }

    /// Explicitly forces a topology refresh. Mostly useful for tests and diagnostics; normal
    /// operation refreshes lazily off `Refresh-Topology` response headers.
    pub async fn refresh_topology(&self) -> Result<()> {
        self.0
            .topology
            .refresh(crate::event::topology::RefreshReason::Manual, &self.0.executors)
            .await
    }

    /// The health of the currently favored node's executor, if one has been started yet. `None`
    /// if no request has gone out against this node since the last refresh/failover.
    pub async fn current_node_health(&self) -> Result<Option<crate::node::Health>> {
        let node = self.0.topology.current_node()?;
        Ok(self.0.executors.health_of(&node).await)
    }

    /// Executes one command against the current topology's favored node, failing over to the next
    /// node on a node-level error: the selector has already advanced by the time this returns, so
    /// the *next* call picks the new node.
    pub(crate) async fn execute(
        &self,
        command: &dyn Command,
        headers: HeaderMap,
        options: RequestOptions,
    ) -> Result<RawResponse> {
        let node = self.0.topology.current_node()?;
        let executor = self
            .0
            .executors
            .get_or_start(
                &node,
                self.0.topology.transport(),
                &self.0.conventions,
                self.0.request_handler.as_ref(),
            )
            .await?;

        let etag = self.0.topology.etag_for_header();
        let refresh_trigger = self.refresh_trigger();

        let result = executor
            .request(command, headers, options, etag.as_deref(), &refresh_trigger)
            .await;

        if let Err(err) = &result {
            if matches!(err.kind(), ErrorKind::NodeGone | ErrorKind::Transport { .. }) {
                self.0.executors.evict(&node).await;
                self.0.topology.on_node_failure();
            }
        }

        result
    }

    fn refresh_trigger(&self) -> crate::executor::RefreshTrigger {
        let topology = self.0.topology.clone();
        let executors = self.0.executors.clone();
        Arc::new(move || {
            topology.trigger_refresh(executors.clone());
        })
    }
}

fn parse_seed_url(url: &str, database: &str) -> Result<NodeAddress> {
    let uri: http::Uri = url
        .parse()
        .map_err(|_| Error::new(ErrorKind::InvalidArgument {
            message: format!("invalid seed node url: {url}"),
        }))?;

    let scheme = match uri.scheme_str() {
        Some("https") => Scheme::Https,
        Some("http") | None => Scheme::Http,
        Some(other) => {
            return Err(Error::new(ErrorKind::InvalidArgument {
                message: format!("unsupported scheme in seed node url: {other}"),
            }))
        }
    };

    let host = uri
        .host()
        .ok_or_else(|| Error::new(ErrorKind::InvalidArgument {
            message: format!("seed node url has no host: {url}"),
        }))?
        .to_string();
    let port = uri.port_u16().unwrap_or(match scheme {
        Scheme::Https => 443,
        Scheme::Http => 80,
    });

    Ok(NodeAddress::new(scheme, host, port, database.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seed_url_with_explicit_port() {
        let node = parse_seed_url("http://node-a:8080", "Foo").unwrap();
        assert_eq!(node.host, "node-a");
        assert_eq!(node.port, 8080);
        assert_eq!(node.database, "Foo");
    }

    #[test]
    fn parses_seed_url_default_https_port() {
        let node = parse_seed_url("https://node-a", "Foo").unwrap();
        assert_eq!(node.port, 443);
        assert!(matches!(node.scheme, Scheme::Https));
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(parse_seed_url("ftp://node-a", "Foo").is_err());
    }
}
