use serde::Deserialize;

use crate::{command::Command, node::NodeAddress};

/// `GET {base}/topology`: fetches the current cluster node list and its version etag.
#[derive(Debug, Clone, Default)]
pub(crate) struct TopologyRefresh;

impl Command for TopologyRefresh {
    fn method(&self) -> http::Method {
        http::Method::GET
    }

    fn build_url(&self, node: &NodeAddress) -> String {
        format!("{}/topology", node.base_url())
    }

    fn body(&self) -> Option<serde_json::Value> {
        None
    }

    fn is_read_request(&self) -> bool {
        true
    }
}

/// The deserialized response body of a topology refresh.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TopologyRefreshResult {
    #[serde(rename = "Etag")]
    pub etag: String,
    #[serde(rename = "Nodes")]
    pub nodes: Vec<TopologyRefreshNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TopologyRefreshNode {
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "Database")]
    pub database: String,
    #[serde(rename = "ClusterTag")]
    pub cluster_tag: Option<String>,
}
