//! Server Node: the immutable identity plus mutable health of one cluster member.

use std::{fmt, sync::Arc};

/// The scheme a node is reached over.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// TLS transport configuration, supplied by the caller: an optional client identity for mutual
/// TLS and an optional extra trust root bundle, the shape `rustls` + `rustls-pemfile` +
/// `webpki-roots` need. No key *management* lives here, only configuration.
#[derive(Clone, Default)]
pub struct TransportOptions {
    /// PEM-encoded client certificate chain, for mutual TLS.
    pub client_cert_chain_pem: Option<Arc<[u8]>>,
    /// PEM-encoded client private key, for mutual TLS.
    pub client_key_pem: Option<Arc<[u8]>>,
    /// Additional PEM-encoded root certificates to trust, appended to the platform/webpki roots.
    pub extra_root_certs_pem: Option<Arc<[u8]>>,
}

impl fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportOptions")
            .field("client_cert_chain_pem", &self.client_cert_chain_pem.is_some())
            .field("client_key_pem", &self.client_key_pem.is_some())
            .field("extra_root_certs_pem", &self.extra_root_certs_pem.is_some())
            .finish()
    }
}

/// A node's observed health. `Healthy` iff the connection handle is open and the last completed
/// request was either a success or a non-retryable error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Health {
    Healthy,
    Unhealthy,
}

/// Identity of one server in the cluster. Cheaply clonable; the mutable health/registry lookup
/// lives behind the executor registry — the node holds identifiers, not handles, so it carries no
/// cyclic reference back to its executor.
#[derive(Clone, Debug)]
pub struct NodeAddress {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Optional cluster tag (e.g. `"A"`, `"B"`), set asynchronously via
    /// [`crate::executor::ExecutorHandle::update_cluster_tag`].
    pub cluster_tag: Option<String>,
}

impl NodeAddress {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
            database: database.into(),
            cluster_tag: None,
        }
    }

    /// The base URL for this node's database, e.g. `https://node-a:8080/databases/Foo`.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}/databases/{}",
            self.scheme, self.host, self.port, self.database
        )
    }

    /// The registry key identifying the executor that owns this `(url, database)` pair.
    pub fn registry_key(&self) -> (String, String) {
        (format!("{}://{}:{}", self.scheme, self.host, self.port), self.database.clone())
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url())
    }
}
