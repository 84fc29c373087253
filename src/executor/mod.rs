//! Request Executor: one actor per `(node-url, database)`, owning a single multiplexed
//! [`crate::connection::Connection`] and driving retry/failover.
//!
//! The "actor" here is the background task spawned by [`ExecutorWorker::start`], which
//! demultiplexes wire events from the connection's reader tasks back to whichever in-flight
//! `request()` call is waiting on them via a dedicated assembler task that forwards wire events to
//! the right pending reply. [`ExecutorHandle`] is the cheap, `Clone`-able handle callers use to
//! issue `request`/`update_cluster_tag` calls; because `hyper`'s `SendRequest` already multiplexes
//! concurrent calls onto one connection (FIFO on the wire, replies may complete out of order),
//! those calls don't need to queue behind a literal mailbox.

mod classify;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use bytes::BytesMut;
use http::{HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::{
    command::{Command, PreparedRequest},
    connection::{Connection, ConnectionDriver, Event},
    conventions::{Conventions, RequestOptions},
    error::{Error, ErrorKind, Result},
    event::request::{
        RequestEvent, RequestEventHandler, RequestFailedEvent, RequestStartedEvent,
        RequestSucceededEvent,
    },
    node::{NodeAddress, TransportOptions},
};

use self::classify::{classify, Outcome};

/// An assembled HTTP response, ready for classification.
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Closure invoked (fire-and-forget) when a response carries `Refresh-Topology`.
pub(crate) type RefreshTrigger = Arc<dyn Fn() + Send + Sync>;

struct InFlight {
    status: Option<u16>,
    headers: HeaderMap,
    body: BytesMut,
    error: Option<String>,
    reply: oneshot::Sender<std::result::Result<RawAssembled, String>>,
}

struct RawAssembled {
    status: u16,
    headers: HeaderMap,
    body: BytesMut,
}

type PendingMap = Arc<Mutex<HashMap<u64, InFlight>>>;

/// A handle to a node's request executor. Cheap to clone; every clone shares the same underlying
/// connection and in-flight request table.
#[derive(Clone)]
pub(crate) struct ExecutorHandle {
    node: NodeAddress,
    connection: Arc<Connection>,
    pending: PendingMap,
    next_request_id: Arc<AtomicU64>,
    dead: Arc<AtomicBool>,
    conventions: Arc<Conventions>,
    events: mpsc::UnboundedSender<Event>,
    user_handler: Option<Arc<dyn RequestEventHandler>>,
    tracing_handler: Arc<dyn RequestEventHandler>,
}

impl ExecutorHandle {
    /// Executes `command` against this node, retrying per `options` on a retryable outcome.
    ///
    /// `topology_etag` is `None` when `conventions.disable_topology_update` is set, otherwise the
    /// current topology etag to stamp on the `Topology-Etag` header.
    pub(crate) async fn request(
        &self,
        command: &dyn Command,
        mut extra_headers: HeaderMap,
        options: RequestOptions,
        topology_etag: Option<&str>,
        refresh_trigger: &RefreshTrigger,
    ) -> Result<RawResponse> {
        if self.dead.load(Ordering::Acquire) {
            return Err(Error::new(ErrorKind::ExecutorGone));
        }

        let prepared = PreparedRequest::prepare(command, &self.node);

        // Refused locally; no packet sent.
        if prepared.is_read_request {
            let length = prepared.url.chars().count();
            if length > self.conventions.max_length_of_query_using_get_url {
                return Err(Error::new(ErrorKind::MaximumUrlLengthReached {
                    length,
                    limit: self.conventions.max_length_of_query_using_get_url,
                }));
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        if let Some(etag) = topology_etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert("Topology-Etag", value);
            }
        }
        headers.extend(extra_headers.drain());

        let max_attempts = options.effective_retry_count();
        let mut attempt = 0u32;

        loop {
            let start = Instant::now();
            let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);

            self.emit(RequestEvent::Started(RequestStartedEvent {
                node: self.node.base_url(),
                database: self.node.database.clone(),
                method: prepared.method.to_string(),
                url: prepared.url.clone(),
                request_id,
            }));

            let (err, retryable) = match self
                .try_once(request_id, &prepared, headers.clone(), &options, start, refresh_trigger)
                .await
            {
                Ok(response) => return Ok(response),
                Err(outcome) => outcome,
            };

            self.emit_failure(request_id, start, &err, retryable);

            if retryable && attempt < max_attempts {
                attempt += 1;
                tokio::time::sleep(options.retry_backoff).await;
                continue;
            }

            return Err(err);
        }
    }

    /// Runs one attempt to completion: submit, await assembly, classify. Returns either the
    /// successful response or `(error, retryable)` for the caller's retry loop to act on.
    async fn try_once(
        &self,
        request_id: u64,
        prepared: &PreparedRequest,
        headers: HeaderMap,
        options: &RequestOptions,
        start: Instant,
        refresh_trigger: &RefreshTrigger,
    ) -> std::result::Result<RawResponse, (Error, bool)> {
        let raw = self
            .submit_and_await(request_id, prepared, headers)
            .await
            .map_err(|e| (e, false))?;

        let body: Value = if raw.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&raw.body)
                .map_err(|e| (Error::invalid_response_payload(e.to_string()), false))?
        };

        match classify(raw.status, &raw.headers, &body, options.retry_on_stale) {
            Outcome::Success => {
                self.emit(RequestEvent::Succeeded(RequestSucceededEvent {
                    node: self.node.base_url(),
                    database: self.node.database.clone(),
                    request_id,
                    duration: start.elapsed(),
                    status: raw.status,
                }));

                if raw.headers.contains_key("Refresh-Topology") {
                    self.emit(RequestEvent::TopologyRefreshRequested {
                        node: self.node.base_url(),
                    });
                    (refresh_trigger)();
                }

                Ok(RawResponse {
                    status: raw.status,
                    headers: raw.headers,
                    body,
                })
            }
            Outcome::Retryable(err) => Err((err, true)),
            Outcome::NonRetryable(err) => Err((err, false)),
        }
    }

    async fn submit_and_await(
        &self,
        request_id: u64,
        prepared: &PreparedRequest,
        headers: HeaderMap,
    ) -> Result<RawAssembled> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                request_id,
                InFlight {
                    status: None,
                    headers: HeaderMap::new(),
                    body: BytesMut::new(),
                    error: None,
                    reply: tx,
                },
            );
        }

        if let Err(e) = self.connection.submit(request_id, prepared, headers, self.events.clone()) {
            self.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.conventions.timeout, rx).await {
            Ok(Ok(Ok(raw))) => Ok(raw),
            Ok(Ok(Err(message))) => Err(Error::new(ErrorKind::Http { message })),
            Ok(Err(_)) => Err(Error::new(ErrorKind::ExecutorGone)),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(Error::new(ErrorKind::Transport {
                    message: format!(
                        "request timed out after {:?} waiting for a response",
                        self.conventions.timeout
                    ),
                }))
            }
        }
    }

    /// Updates the cluster tag this executor reports for its node.
    pub(crate) fn update_cluster_tag(&mut self, tag: Option<String>) {
        self.node.cluster_tag = tag;
    }

    pub(crate) fn node(&self) -> &NodeAddress {
        &self.node
    }

    /// `Healthy` iff the connection handle is still open; `Unhealthy` once the assembler task has
    /// observed the connection close (gracefully or otherwise) and drained its pending callers.
    pub(crate) fn health(&self) -> crate::node::Health {
        if self.dead.load(Ordering::Acquire) {
            crate::node::Health::Unhealthy
        } else {
            crate::node::Health::Healthy
        }
    }

    fn emit(&self, event: RequestEvent) {
        crate::event::emit_request_event(self.user_handler.as_ref(), Some(&self.tracing_handler), || {
            event.clone()
        });
    }

    fn emit_failure(&self, request_id: u64, start: Instant, err: &Error, retryable: bool) {
        crate::trace::log_compat_failure(&format!(
            "request {request_id} to {} failed: {err} (retryable={retryable})",
            self.node.base_url()
        ));
        self.emit(RequestEvent::Failed(RequestFailedEvent {
            node: self.node.base_url(),
            database: self.node.database.clone(),
            request_id,
            duration: start.elapsed(),
            failure: err.clone(),
            retryable,
        }));
    }
}

/// Owns the startup sequence for a node's executor: connects, then spawns the assembler task that
/// demultiplexes wire events for the lifetime of the connection.
pub(crate) struct ExecutorWorker;

impl ExecutorWorker {
    /// Attempts `connect`; on failure, returns the transport error for the caller (the
    /// registry/supervisor) to decide whether to retry creation. On success, spawns the assembler
    /// task and returns a live handle.
    pub(crate) async fn start(
        node: NodeAddress,
        transport: TransportOptions,
        conventions: Arc<Conventions>,
        user_handler: Option<Arc<dyn RequestEventHandler>>,
    ) -> Result<ExecutorHandle> {
        let (connection, driver) = Connection::connect(&node, &transport).await?;

        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let dead = Arc::new(AtomicBool::new(false));

        let handle = ExecutorHandle {
            node,
            connection: Arc::new(connection),
            pending: pending.clone(),
            next_request_id: Arc::new(AtomicU64::new(1)),
            dead: dead.clone(),
            conventions,
            events: event_tx,
            user_handler,
            tracing_handler: Arc::new(crate::trace::RequestTracingEventEmitter),
        };

        tokio::spawn(Self::assemble(driver, pending, dead, event_rx));

        Ok(handle)
    }

    /// The assembler task: the one genuinely serial consumer of wire events for this connection.
    /// Demultiplexes `Event`s by `request_id` and resolves the matching pending caller on `Done`;
    /// on connection death, drains all pending callers with an error and exits.
    async fn assemble(
        mut driver: ConnectionDriver,
        pending: PendingMap,
        dead: Arc<AtomicBool>,
        mut event_rx: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                biased;
                closed = &mut driver.closed => {
                    let reason = match closed {
                        Ok(Ok(())) => "connection closed".to_string(),
                        Ok(Err(e)) => e.to_string(),
                        Err(_) => "connection driver task ended unexpectedly".to_string(),
                    };
                    dead.store(true, Ordering::Release);
                    let mut pending = pending.lock().await;
                    for (_, in_flight) in pending.drain() {
                        let _ = in_flight.reply.send(Err(reason.clone()));
                    }
                    return;
                }
                event = event_rx.recv() => {
                    match event {
                        Some(event) => Self::handle_event(&pending, event).await,
                        None => return,
                    }
                }
            }
        }
    }

    async fn handle_event(pending: &PendingMap, event: Event) {
        let mut pending = pending.lock().await;
        match event {
            Event::Status { request_id, code } => {
                if let Some(in_flight) = pending.get_mut(&request_id) {
                    in_flight.status = Some(code);
                }
            }
            Event::Headers { request_id, headers } => {
                if let Some(in_flight) = pending.get_mut(&request_id) {
                    in_flight.headers = headers;
                }
            }
            Event::Data { request_id, chunk } => {
                if let Some(in_flight) = pending.get_mut(&request_id) {
                    in_flight.body.extend_from_slice(&chunk);
                }
            }
            Event::HttpError { request_id, message } => {
                // HTTP-level errors are logged; the executor (and connection) continue serving
                // other requests.
                tracing::warn!(target: "ravendb::request", request_id, message = %message, "http stream error");
                if let Some(in_flight) = pending.get_mut(&request_id) {
                    in_flight.error = Some(message);
                }
            }
            Event::Done { request_id } => {
                if let Some(in_flight) = pending.remove(&request_id) {
                    let result = match in_flight.error {
                        Some(message) => Err(message),
                        None => Ok(RawAssembled {
                            status: in_flight.status.unwrap_or(0),
                            headers: in_flight.headers,
                            body: in_flight.body,
                        }),
                    };
                    let _ = in_flight.reply.send(result);
                }
            }
        }
    }
}
