//! Registries: the two concurrent name-to-actor directories a store maintains — one for request
//! executors (keyed by node url + database), one for sessions (keyed by session id).
//!
//! Both are built on the same generic directory: register-on-start, deregister-on-stop, and
//! last-writer-wins on a key collision is structurally impossible because keys are unique by
//! construction (a node url+database pair, or a freshly generated session id).

use std::{collections::HashMap, hash::Hash, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    conventions::Conventions,
    error::Result,
    event::request::RequestEventHandler,
    executor::{ExecutorHandle, ExecutorWorker},
    node::{NodeAddress, TransportOptions},
};

/// A generic, async-safe directory of live actor handles keyed by `K`.
struct Directory<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> Directory<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn insert(&self, key: K, value: V) {
        self.entries.lock().await.insert(key, value);
    }

    async fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().await.remove(key)
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// The executor directory: one live [`ExecutorHandle`] per `(node url, database)` pair, started
/// lazily the first time a node is selected and kept alive until explicitly evicted (e.g. on a
/// `410 Gone` or a dead connection).
pub(crate) struct ExecutorRegistry {
    directory: Directory<(String, String), ExecutorHandle>,
}

impl ExecutorRegistry {
    pub(crate) fn new() -> Self {
        Self {
            directory: Directory::new(),
        }
    }

    /// Returns the live executor for `node`, starting one if none is registered yet.
    pub(crate) async fn get_or_start(
        &self,
        node: &NodeAddress,
        transport: &TransportOptions,
        conventions: &Arc<Conventions>,
        user_handler: Option<&Arc<dyn RequestEventHandler>>,
    ) -> Result<ExecutorHandle> {
        let key = node.registry_key();
        if let Some(existing) = self.directory.get(&key).await {
            return Ok(existing);
        }

        let handle = ExecutorWorker::start(
            node.clone(),
            transport.clone(),
            conventions.clone(),
            user_handler.cloned(),
        )
        .await?;

        self.directory.insert(key, handle.clone()).await;
        Ok(handle)
    }

    /// Deregisters a node's executor, e.g. after it reports `410 Gone` or its connection dies.
    pub(crate) async fn evict(&self, node: &NodeAddress) {
        self.directory.remove(&node.registry_key()).await;
    }

    /// The health of `node`'s executor, if one has been started. `None` if no executor has been
    /// started for this node yet.
    pub(crate) async fn health_of(&self, node: &NodeAddress) -> Option<crate::node::Health> {
        self.directory.get(&node.registry_key()).await.map(|handle| handle.health())
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.directory.len().await
    }
}

/// The session directory: one entry per open [`crate::session::Session`], keyed by session id.
/// Registration happens in [`crate::store::Store::open_session`]; deregistration happens via
/// [`SessionRegistry::deregister`], called on explicit close, or simply falls away when a session
/// goes out of scope (sessions carry no background task of their own).
pub(crate) struct SessionRegistry<V> {
    directory: Directory<String, V>,
}

impl<V: Clone> SessionRegistry<V> {
    pub(crate) fn new() -> Self {
        Self {
            directory: Directory::new(),
        }
    }

    pub(crate) async fn register(&self, id: String, value: V) {
        self.directory.insert(id, value).await;
    }

    pub(crate) async fn get(&self, id: &str) -> Option<V> {
        self.directory.get(&id.to_string()).await
    }

    pub(crate) async fn deregister(&self, id: &str) {
        self.directory.remove(&id.to_string()).await;
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.directory.len().await
    }
}
