use serde::Deserialize;
use serde_json::{json, Value};

use crate::{command::Command, node::NodeAddress};

/// One entry in a Batch command's `"Commands"` array. `Put`/`Delete` are the two kinds a session
/// emits itself; `Raw` carries a caller-supplied deferred command through verbatim.
#[derive(Debug, Clone)]
pub enum BatchCommandItem {
    Put {
        id: String,
        document: Value,
        change_vector: Option<String>,
    },
    Delete {
        id: String,
        change_vector: Option<String>,
    },
    Raw(Value),
}

impl BatchCommandItem {
    fn to_json(&self) -> Value {
        match self {
            BatchCommandItem::Put {
                id,
                document,
                change_vector,
            } => {
                let mut value = json!({
                    "Type": "PUT",
                    "Id": id,
                    "Document": document,
                });
                if let Some(cv) = change_vector {
                    value["ChangeVector"] = json!(cv);
                }
                value
            }
            BatchCommandItem::Delete { id, change_vector } => {
                let mut value = json!({
                    "Type": "DELETE",
                    "Id": id,
                });
                if let Some(cv) = change_vector {
                    value["ChangeVector"] = json!(cv);
                }
                value
            }
            BatchCommandItem::Raw(value) => value.clone(),
        }
    }
}

/// `POST {node-url}/bulk_docs` with body `{"Commands": [...]}`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub commands: Vec<BatchCommandItem>,
}

impl Command for Batch {
    fn method(&self) -> http::Method {
        http::Method::POST
    }

    fn build_url(&self, node: &NodeAddress) -> String {
        format!("{}/bulk_docs", node.base_url())
    }

    fn body(&self) -> Option<Value> {
        Some(json!({
            "Commands": self.commands.iter().map(BatchCommandItem::to_json).collect::<Vec<_>>(),
        }))
    }

    fn is_read_request(&self) -> bool {
        false
    }
}

/// The deserialized response body of a Batch command.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResult {
    #[serde(rename = "Results")]
    pub results: Vec<BatchResultItem>,
}

/// One entry in a Batch response's `"Results"` array.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResultItem {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "@change-vector")]
    pub change_vector: Option<String>,
    #[serde(rename = "@collection")]
    pub collection: Option<String>,
    #[serde(rename = "@last-modified")]
    pub last_modified: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Scheme;

    #[test]
    fn builds_bulk_docs_body() {
        let batch = Batch {
            commands: vec![BatchCommandItem::Put {
                id: "users/1".to_string(),
                document: json!({"name": "a"}),
                change_vector: None,
            }],
        };
        let node = NodeAddress::new(Scheme::Http, "a", 8080, "Foo");
        assert_eq!(batch.build_url(&node), "http://a:8080/databases/Foo/bulk_docs");
        let body = batch.body().unwrap();
        assert_eq!(body["Commands"][0]["Type"], "PUT");
        assert_eq!(body["Commands"][0]["Id"], "users/1");
        assert!(!batch.is_read_request());
    }
}
