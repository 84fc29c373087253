use crate::{
    command::{push_query_param, Command},
    node::NodeAddress,
};

/// `GET {node-url}/docs?id=...&start=...&pageSize=...&metadataOnly=...&includes=...`
#[derive(Debug, Clone, Default)]
pub struct GetDocuments {
    pub ids: Vec<String>,
    pub start: Option<u32>,
    pub page_size: Option<u32>,
    pub metadata_only: Option<bool>,
    pub includes: Vec<String>,
}

impl GetDocuments {
    /// Convenience constructor for loading a single document by id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            ids: vec![id.into()],
            ..Default::default()
        }
    }
}

impl Command for GetDocuments {
    fn method(&self) -> http::Method {
        http::Method::GET
    }

    fn build_url(&self, node: &NodeAddress) -> String {
        let mut query = String::new();
        for id in &self.ids {
            push_query_param(&mut query, "id", Some(id));
        }
        push_query_param(&mut query, "start", self.start.map(|v| v.to_string()).as_deref());
        push_query_param(
            &mut query,
            "pageSize",
            self.page_size.map(|v| v.to_string()).as_deref(),
        );
        push_query_param(
            &mut query,
            "metadataOnly",
            self.metadata_only.map(|v| v.to_string()).as_deref(),
        );
        for include in &self.includes {
            push_query_param(&mut query, "includes", Some(include));
        }

        if query.is_empty() {
            format!("{}/docs", node.base_url())
        } else {
            format!("{}/docs?{}", node.base_url(), query)
        }
    }

    fn body(&self) -> Option<serde_json::Value> {
        None
    }

    fn is_read_request(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Scheme;

    fn node() -> NodeAddress {
        NodeAddress::new(Scheme::Http, "a", 8080, "Foo")
    }

    #[test]
    fn builds_single_id_url() {
        let cmd = GetDocuments::by_id("users/1");
        let url = cmd.build_url(&node());
        assert_eq!(url, "http://a:8080/databases/Foo/docs?id=users%2F1");
        assert!(cmd.is_read_request());
        assert!(cmd.body().is_none());
    }

    #[test]
    fn repeats_id_and_omits_nil_params() {
        let cmd = GetDocuments {
            ids: vec!["a/1".to_string(), "a/2".to_string()],
            metadata_only: Some(true),
            ..Default::default()
        };
        let url = cmd.build_url(&node());
        assert!(url.contains("id=a%2F1"));
        assert!(url.contains("id=a%2F2"));
        assert!(url.contains("metadataOnly=true"));
        assert!(!url.contains("start="));
        assert!(!url.contains("pageSize="));
    }
}
