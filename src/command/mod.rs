//! The uniform shape every command honors — method, URL builder, body encoder, read/write flag —
//! plus the command implementations: document fetch, batch writes, and topology refresh.

mod batch;
mod get_documents;
mod topology_refresh;

pub use batch::{Batch, BatchCommandItem, BatchResult, BatchResultItem};
pub use get_documents::GetDocuments;
pub(crate) use topology_refresh::{TopologyRefresh, TopologyRefreshNode, TopologyRefreshResult};

use crate::node::NodeAddress;

/// A command, lazily turned into a concrete HTTP request against a chosen node: a plain value
/// that the executor interprets.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The HTTP method this command is sent with.
    fn method(&self) -> http::Method;

    /// Builds the URL for this command against the given node. Lazy: only called once a node has
    /// been selected.
    fn build_url(&self, node: &NodeAddress) -> String;

    /// The JSON body to send, if any.
    fn body(&self) -> Option<serde_json::Value>;

    /// Whether this is a read request, used by the executor's URL-length guard.
    fn is_read_request(&self) -> bool;
}

/// A command plus the node it was built against; what [`Command::build_url`]/[`Command::body`]
/// get flattened into before being handed to the executor.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: http::Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
    pub is_read_request: bool,
}

impl PreparedRequest {
    pub fn prepare(command: &dyn Command, node: &NodeAddress) -> Self {
        Self {
            method: command.method(),
            url: command.build_url(node),
            body: command.body(),
            is_read_request: command.is_read_request(),
        }
    }
}

/// Appends `key=value` to a query string being built, percent-encoding the value, unless `value`
/// is `None` (nil parameters are omitted rather than sent empty).
pub(crate) fn push_query_param(query: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(key);
        query.push('=');
        query.push_str(
            &percent_encoding::utf8_percent_encode(value, percent_encoding::NON_ALPHANUMERIC)
                .to_string(),
        );
    }
}
