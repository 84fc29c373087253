//! Conventions: the tunable knobs recognized by a [`crate::store::Store`].

use std::time::Duration;

use typed_builder::TypedBuilder;

/// Store-wide conventions. Constructed via [`Conventions::builder`]; every field has a sensible
/// default, so `Conventions::builder().build()` is always valid.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Conventions {
    /// A session refuses new commits past this many requests. Default: 30.
    #[builder(default = 30)]
    pub max_number_of_requests_per_session: u32,

    /// Hint for batch-load sizing. Default: 32.
    #[builder(default = 32)]
    pub max_ids_to_catch: usize,

    /// Per-request wall clock timeout. Default: 30s.
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,

    /// If true, write commands must attach the last known change-vector and the server rejects on
    /// mismatch. Default: false.
    #[builder(default = false)]
    pub use_optimistic_concurrency: bool,

    /// Any GET whose URL exceeds this length is refused locally. Default: 1536.
    #[builder(default = 1536)]
    pub max_length_of_query_using_get_url: usize,

    /// Joins id prefix and identifier parts. Default: "/".
    #[builder(default = "/".to_string())]
    pub identity_parts_separator: String,

    /// If true, omit the `Topology-Etag` request header and ignore `Refresh-Topology` responses.
    /// Default: false.
    #[builder(default = false)]
    pub disable_topology_update: bool,
}

impl Default for Conventions {
    fn default() -> Self {
        Conventions::builder().build()
    }
}

/// Per-call options governing retry/backoff behavior for a single request executed through the
/// [`crate::executor`].
#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct RequestOptions {
    /// Whether to retry retryable outcomes at all. Default: false.
    #[builder(default = false)]
    pub retry_on_failure: bool,

    /// Number of retry attempts after the first try. Forced to zero when `retry_on_failure` is
    /// false. Default: 3.
    #[builder(default = 3)]
    pub retry_count: u32,

    /// Constant backoff between attempts. Default: 100ms.
    #[builder(default = Duration::from_millis(100))]
    pub retry_backoff: Duration,

    /// Whether a `stale` result should be retried by this node's policy. Default: false.
    #[builder(default = false)]
    pub retry_on_stale: bool,
}

impl RequestOptions {
    /// Returns the effective retry count honoring the `retry_on_failure` gate.
    pub(crate) fn effective_retry_count(&self) -> u32 {
        if self.retry_on_failure {
            self.retry_count
        } else {
            0
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions::builder().build()
    }
}
