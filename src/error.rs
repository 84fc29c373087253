//! The error and result types returned by all fallible operations in this crate.

use std::sync::Arc;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that occurred during the execution of an operation against a store, a session, or a
/// single node in the cluster.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub(crate) kind: Arc<ErrorKind>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Arc::new(kind),
        }
    }

    /// The specific kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Whether this error is classified as retryable by the executor's response classifier.
    pub fn is_retryable(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::Conflict
                | ErrorKind::NodeGone
                | ErrorKind::Stale { retry: true }
                | ErrorKind::Server { retryable: true, .. }
        )
    }

    pub(crate) fn document_not_found() -> Self {
        Self::new(ErrorKind::DocumentNotFound)
    }

    pub(crate) fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized)
    }

    pub(crate) fn conflict() -> Self {
        Self::new(ErrorKind::Conflict)
    }

    pub(crate) fn node_gone() -> Self {
        Self::new(ErrorKind::NodeGone)
    }

    pub(crate) fn stale(retry: bool) -> Self {
        Self::new(ErrorKind::Stale { retry })
    }

    pub(crate) fn server_message(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(ErrorKind::Server {
            message: message.into(),
            retryable,
        })
    }

    pub(crate) fn invalid_response_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponsePayload {
            message: message.into(),
        })
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// The specific kind of error encountered, grouped by severity tier: local guards, non-retryable
/// server responses, retryable server responses, and transport errors.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    // --- Tier 1: local guards ---
    /// `store` was called with a null/absent entity.
    #[error("cannot store a null entity")]
    NullEntity,

    /// `store` was called without an explicit key and the entity carried no usable id.
    #[error("no valid id was informed for the entity being stored")]
    NoValidIdInformed,

    /// A read request's URL exceeded `conventions.max_length_of_query_using_get_url`.
    #[error("maximum url length reached: {length} exceeds the configured limit of {limit}")]
    MaximumUrlLengthReached { length: usize, limit: usize },

    /// `save_changes` was refused because `number_of_requests` already reached the configured
    /// maximum.
    #[error(
        "the session has exceeded the maximum number of requests ({max}) permitted per session"
    )]
    MaxRequestsExceeded { max: u32 },

    // --- Tier 2: non-retryable server responses ---
    /// The server replied `404`.
    #[error("document not found")]
    DocumentNotFound,

    /// The server replied `403`.
    #[error("unauthorized")]
    Unauthorized,

    /// The response body could not be parsed as JSON, or lacked the structure expected for its
    /// status code.
    #[error("invalid response payload: {message}")]
    InvalidResponsePayload { message: String },

    // --- Tiers 2 and 3 share a shape: whether a `Stale` or `Server` error is retryable depends on
    // node policy / status code. ---
    /// The response body had `"IsStale": true`.
    #[error("stale result (retry = {retry})")]
    Stale { retry: bool },

    /// A generic server-reported error, classified retryable or not by status code.
    #[error("server error: {message}")]
    Server { message: String, retryable: bool },

    /// The response had `409 Conflict` (retryable, see Open Questions in DESIGN.md).
    #[error("conflict")]
    Conflict,

    /// The response had `410 Gone` (node no longer serves this database).
    #[error("node gone")]
    NodeGone,

    // --- Tier 4: transport ---
    /// The underlying TCP/TLS connection to a node failed or was lost.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// An HTTP-protocol-level error occurred mid-stream; the connection survives.
    #[error("http protocol error: {message}")]
    Http { message: String },

    /// The executor actor for a node exited (normally or abnormally) while a caller was waiting
    /// on a reply.
    #[error("the request executor's channel was closed before a response arrived")]
    ExecutorGone,

    /// The session actor's channel was closed before a reply arrived.
    #[error("the session's channel was closed before a response arrived")]
    SessionGone,

    // --- Misc ---
    /// An argument passed by the caller was invalid independent of session/server state.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Retries against a node were exhausted; this wraps the last retryable outcome observed.
    #[error("retries exhausted: {source}")]
    RetriesExhausted { source: Box<ErrorKind> },

    /// No node is registered for the store's topology.
    #[error("no nodes are available in the current topology")]
    NoNodesAvailable,
}
