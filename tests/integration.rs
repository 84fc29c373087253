//! End-to-end scenarios against a mocked server, exercising the full store -> session -> executor
//! -> connection stack over real HTTP/1.1 (wiremock listens on a real loopback socket).

use ravendb::{Conventions, RequestOptions, Store, TransportOptions};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

async fn store_against(server: &MockServer) -> Store {
    let conventions = Conventions::builder().disable_topology_update(true).build();
    Store::new(&[server.uri()], "Foo", conventions, TransportOptions::default(), None, None).unwrap()
}

#[tokio::test]
async fn loading_a_fresh_document_fetches_and_tracks_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases/Foo/docs"))
        .and(query_param("id", "orders/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Results": [{
                "Id": "orders/1",
                "Amount": 10,
                "@metadata": {"@change-vector": "A:1-abc", "@collection": "Orders"},
            }]
        })))
        .mount(&server)
        .await;

    let store = store_against(&server).await;
    let mut session = store.open_session().await;

    let doc = session.load("orders/1").await.unwrap().unwrap();
    assert_eq!(doc["Amount"], 10);

    // Second load for the same id is served from the identity map; no second mock hit is required
    // because wiremock would otherwise 404 on an unexpected extra request.
    let doc_again = session.load("orders/1").await.unwrap().unwrap();
    assert_eq!(doc_again["Id"], "orders/1");
}

#[tokio::test]
async fn loading_a_missing_document_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases/Foo/docs"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({})))
        .mount(&server)
        .await;

    let store = store_against(&server).await;
    let mut session = store.open_session().await;

    let doc = session.load("orders/missing").await.unwrap();
    assert!(doc.is_none());
}

#[tokio::test]
async fn store_then_save_changes_sends_a_single_put_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases/Foo/bulk_docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Results": [{
                "Type": "PUT",
                "@id": "orders/2",
                "@change-vector": "A:2-def",
                "@collection": "Orders",
            }]
        })))
        .mount(&server)
        .await;

    let store = store_against(&server).await;
    let mut session = store.open_session().await;

    let key = session
        .store(json!({"Id": "orders/2", "Amount": 42}), None, None)
        .unwrap();
    assert_eq!(key, "orders/2");

    session.save_changes().await.unwrap();

    // P2: after a successful commit, original_value/original_metadata must equal entity/metadata.
    let doc = session.tracked("orders/2").unwrap();
    assert_eq!(doc.change_vector.as_deref(), Some("A:2-def"));
    assert_eq!(doc.metadata.collection.as_deref(), Some("Orders"));
    assert_eq!(doc.metadata.change_vector.as_deref(), Some("A:2-def"));
    assert_eq!(doc.original_value.as_ref(), Some(&doc.entity));
    assert_eq!(doc.original_metadata.as_ref(), Some(&doc.metadata));

    // A second save_changes with nothing dirty must not hit the mock again (no un-mocked request).
    session.save_changes().await.unwrap();
}

#[tokio::test]
async fn store_with_explicit_change_vector_attaches_it_without_a_prior_load() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases/Foo/bulk_docs"))
        .and(wiremock::matchers::body_json(json!({
            "Commands": [{
                "Type": "PUT",
                "Id": "orders/9",
                "Document": {"Id": "orders/9", "Amount": 1},
                "ChangeVector": "A:9-known",
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Results": [{"Type": "PUT", "@id": "orders/9", "@change-vector": "A:9-new"}]
        })))
        .mount(&server)
        .await;

    let conventions = Conventions::builder()
        .disable_topology_update(true)
        .use_optimistic_concurrency(true)
        .build();
    let store = Store::new(&[server.uri()], "Foo", conventions, TransportOptions::default(), None, None).unwrap();
    let mut session = store.open_session().await;

    // No load() happened first; the change-vector can only come from the explicit parameter.
    session
        .store(
            json!({"Id": "orders/9", "Amount": 1}),
            None,
            Some("A:9-known".to_string()),
        )
        .unwrap();
    assert_eq!(session.tracked("orders/9").unwrap().change_vector.as_deref(), Some("A:9-known"));

    session.save_changes().await.unwrap();
    assert_eq!(session.tracked("orders/9").unwrap().change_vector.as_deref(), Some("A:9-new"));
}

#[tokio::test]
async fn delete_then_save_changes_sends_a_delete_command() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases/Foo/bulk_docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Results": [{"Type": "DELETE", "@id": "orders/3"}]
        })))
        .mount(&server)
        .await;

    let store = store_against(&server).await;
    let mut session = store.open_session().await;
    session.delete("orders/3");
    session.save_changes().await.unwrap();
}

#[tokio::test]
async fn retryable_503_is_retried_and_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/databases/Foo/docs"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"Message": "warming up"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/databases/Foo/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Results": [{"Id": "orders/4", "@metadata": {}}]
        })))
        .mount(&server)
        .await;

    let store = store_against(&server).await;
    let mut session = store.open_session().await;
    session.set_request_options(
        RequestOptions::builder()
            .retry_on_failure(true)
            .retry_count(2)
            .retry_backoff(Duration::from_millis(5))
            .build(),
    );

    let doc = session.load("orders/4").await.unwrap();
    assert!(doc.is_some());
}

#[tokio::test]
async fn non_retryable_503_with_database_missing_header_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases/Foo/docs"))
        .respond_with(
            ResponseTemplate::new(503)
                .insert_header("Database-Missing", "Foo")
                .set_body_json(json!({"Message": "no such database"})),
        )
        .mount(&server)
        .await;

    let store = store_against(&server).await;
    let mut session = store.open_session().await;
    session.set_request_options(
        RequestOptions::builder()
            .retry_on_failure(true)
            .retry_count(3)
            .retry_backoff(Duration::from_millis(5))
            .build(),
    );

    let err = session.load("orders/5").await.unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn max_requests_per_session_is_enforced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases/Foo/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Results": [null]})))
        .mount(&server)
        .await;

    let conventions = Conventions::builder()
        .disable_topology_update(true)
        .max_number_of_requests_per_session(1u32)
        .build();
    let store = Store::new(&[server.uri()], "Foo", conventions, TransportOptions::default(), None, None).unwrap();
    let mut session = store.open_session().await;

    session.load("orders/a").await.unwrap();
    let err = session.load("orders/b").await.unwrap_err();
    assert!(matches!(err.kind(), ravendb::ErrorKind::MaxRequestsExceeded { .. }));
}

#[tokio::test]
async fn refresh_topology_updates_the_node_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases/Foo/topology"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Etag": "7",
            "Nodes": [{"Url": server.uri(), "Database": "Foo", "ClusterTag": "A"}],
        })))
        .mount(&server)
        .await;

    let conventions = Conventions::builder().disable_topology_update(false).build();
    let store = Store::new(&[server.uri()], "Foo", conventions, TransportOptions::default(), None, None).unwrap();

    store.refresh_topology().await.unwrap();
}

#[tokio::test]
async fn url_length_guard_refuses_locally_without_a_network_call() {
    let server = MockServer::start().await;
    // No mock is registered for GET /docs at all: if the guard let a request through, wiremock
    // would answer with its default 404-with-no-match response rather than panicking, so this
    // also double-checks via `received_requests` that nothing was sent on the wire.
    let conventions = Conventions::builder()
        .disable_topology_update(true)
        .max_length_of_query_using_get_url(40usize)
        .build();
    let store = Store::new(&[server.uri()], "Foo", conventions, TransportOptions::default(), None, None).unwrap();
    let mut session = store.open_session().await;

    let err = session
        .load("orders/this-identifier-is-long-enough-to-trip-the-guard")
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ravendb::ErrorKind::MaximumUrlLengthReached { .. }));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty(), "guard must refuse before any packet is sent");
}

#[tokio::test]
async fn node_reports_healthy_after_a_successful_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases/Foo/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Results": [null]})))
        .mount(&server)
        .await;

    let store = store_against(&server).await;
    assert!(store.current_node_health().await.unwrap().is_none());

    let mut session = store.open_session().await;
    session.load("orders/a").await.unwrap();

    assert_eq!(
        store.current_node_health().await.unwrap(),
        Some(ravendb::Health::Healthy)
    );
}

/// A `MakeWriter` that captures everything written to it in memory, so a test can assert on the
/// rendered output of a `tracing_subscriber::fmt` subscriber instead of only on stdout.
#[derive(Clone, Default)]
struct CapturingWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl tracing_subscriber::fmt::MakeWriter for CapturingWriter {
    type Writer = CapturingWriter;

    fn make_writer(&self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn request_lifecycle_events_are_emitted_through_tracing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases/Foo/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Results": [null]})))
        .mount(&server)
        .await;

    let writer = CapturingWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = store_against(&server).await;
    let mut session = store.open_session().await;
    session.load("orders/trace-me").await.unwrap();

    let output = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("request started"), "missing start event: {output}");
    assert!(output.contains("request succeeded"), "missing success event: {output}");
}
