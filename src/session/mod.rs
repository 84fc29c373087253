//! Session: a single unit-of-work against one database. Not an actor — a RavenDB-style session is
//! meant to be used by a single caller at a time, and its bookkeeping (the identity map, deferred
//! commands, deletes, request count) is all session-local, so the idiomatic shape is a plain
//! struct with `&mut self` methods, owned by the caller, rather than a spawned task with a
//! mailbox. Concurrency lives one layer down, in the request executor and topology the session
//! borrows from the store to do its network work.

mod document;

pub use document::{DocumentMetadata, SessionDocument};

use std::collections::{HashMap, HashSet};

use http::HeaderMap;
use serde_json::Value;

use crate::{
    command::{Batch, BatchCommandItem, BatchResult, GetDocuments},
    conventions::{Conventions, RequestOptions},
    error::{Error, ErrorKind, Result},
    store::Store,
};

/// A single unit-of-work. Tracks loaded/stored/deleted documents and flushes them to the server as
/// one batch on [`Session::save_changes`].
pub struct Session {
    id: String,
    store: Store,
    conventions: std::sync::Arc<Conventions>,
    request_options: RequestOptions,
    documents_by_id: HashMap<String, SessionDocument>,
    deleted_entities: HashSet<String>,
    defer_commands: Vec<BatchCommandItem>,
    number_of_requests: u32,
}

impl Session {
    pub(crate) fn new(id: String, store: Store) -> Self {
        let conventions = store.conventions();
        Self {
            id,
            store,
            conventions,
            request_options: RequestOptions::default(),
            documents_by_id: HashMap::new(),
            deleted_entities: HashSet::new(),
            defer_commands: Vec::new(),
            number_of_requests: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Overrides the retry/backoff policy used for every request this session issues from here on.
    pub fn set_request_options(&mut self, options: RequestOptions) {
        self.request_options = options;
    }

    /// The identity map's entry for `id`, if it is currently tracked by this session.
    pub fn tracked(&self, id: &str) -> Option<&SessionDocument> {
        self.documents_by_id.get(id)
    }

    /// Returns the session's cached copy if this id is already tracked (identity map: the same id
    /// always returns the same object within a session), otherwise fetches it from the server and
    /// starts tracking it.
    pub async fn load(&mut self, id: &str) -> Result<Option<Value>> {
        if self.deleted_entities.contains(id) {
            return Ok(None);
        }
        if let Some(doc) = self.documents_by_id.get(id) {
            return Ok(Some(doc.entity.clone()));
        }

        self.guard_request_budget()?;

        let command = GetDocuments::by_id(id.to_string());
        let body = match self.execute(&command, self.request_options).await {
            Ok(body) => body,
            // A missing document is a normal, non-exceptional `load` outcome: `None`, not an
            // error, even though the server reports it as a 404.
            Err(e) if matches!(e.kind(), ErrorKind::DocumentNotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.number_of_requests += 1;

        let results = body.get("Results").and_then(Value::as_array);
        let entity = match results.and_then(|r| r.first()) {
            Some(Value::Null) | None => return Ok(None),
            Some(entity) => entity.clone(),
        };

        let metadata = DocumentMetadata::from_metadata_value(entity.get("@metadata"));
        let change_vector = metadata.change_vector.clone();

        self.documents_by_id.insert(
            id.to_string(),
            SessionDocument {
                key: id.to_string(),
                entity: entity.clone(),
                change_vector,
                metadata: metadata.clone(),
                original_metadata: Some(metadata),
                original_value: Some(entity.clone()),
            },
        );

        Ok(Some(entity))
    }

    /// Starts tracking `entity` for the next `save_changes`. `key` is required unless `entity`
    /// carries an `"Id"` field. `change_vector`, if supplied, is the caller's externally-known
    /// change-vector for this id; it is always recorded on the tracked document, but only sent on
    /// commit when `conventions.use_optimistic_concurrency` is set.
    pub fn store(&mut self, entity: Value, key: Option<String>, change_vector: Option<String>) -> Result<String> {
        if entity.is_null() {
            return Err(Error::new(ErrorKind::NullEntity));
        }

        let key = match key {
            Some(key) => key,
            None => entity
                .get("Id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::new(ErrorKind::NoValidIdInformed))?,
        };

        self.deleted_entities.remove(&key);

        let existing = self.documents_by_id.get(&key);
        let change_vector = change_vector.or_else(|| existing.and_then(|d| d.change_vector.clone()));
        let metadata = existing.map(|d| d.metadata.clone()).unwrap_or_default();

        self.documents_by_id.insert(
            key.clone(),
            SessionDocument {
                key: key.clone(),
                entity,
                change_vector,
                metadata,
                original_metadata: None,
                original_value: None,
            },
        );

        Ok(key)
    }

    /// Stops tracking `id` and marks it for deletion on the next `save_changes`.
    pub fn delete(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.documents_by_id.remove(&id);
        self.deleted_entities.insert(id);
    }

    /// Queues a raw batch command to be sent verbatim on the next `save_changes`, bypassing the
    /// identity map.
    pub fn defer(&mut self, command: Value) {
        self.defer_commands.push(BatchCommandItem::Raw(command));
    }

    /// Flushes deferred commands, deletes, then dirty puts as a single batch, in that order, and
    /// reconciles the server's per-command results back into the session's tracked state.
    pub async fn save_changes(&mut self) -> Result<()> {
        self.guard_request_budget()?;

        let mut commands: Vec<BatchCommandItem> = self.defer_commands.drain(..).collect();

        let deleted: Vec<String> = self.deleted_entities.drain().collect();
        for key in &deleted {
            let change_vector = self
                .conventions
                .use_optimistic_concurrency
                .then(|| self.documents_by_id.get(key).and_then(|d| d.change_vector.clone()))
                .flatten();
            commands.push(BatchCommandItem::Delete {
                id: key.clone(),
                change_vector,
            });
        }

        let dirty_keys: Vec<String> = self
            .documents_by_id
            .iter()
            .filter(|(_, doc)| doc.is_dirty())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &dirty_keys {
            let doc = &self.documents_by_id[key];
            let change_vector = if self.conventions.use_optimistic_concurrency {
                doc.change_vector.clone()
            } else {
                None
            };
            commands.push(BatchCommandItem::Put {
                id: key.clone(),
                document: doc.entity.clone(),
                change_vector,
            });
        }

        if commands.is_empty() {
            return Ok(());
        }

        let batch = Batch { commands };
        let body = self.execute(&batch, self.request_options).await?;
        self.number_of_requests += 1;

        let result: BatchResult = serde_json::from_value(body)
            .map_err(|e| Error::invalid_response_payload(e.to_string()))?;

        for item in result.results {
            match item.kind.as_str() {
                "PUT" => {
                    if let Some(id) = &item.id {
                        if let Some(doc) = self.documents_by_id.get_mut(id) {
                            doc.change_vector = item.change_vector.clone();
                            doc.metadata = DocumentMetadata {
                                collection: item.collection.clone(),
                                id: item.id.clone(),
                                change_vector: item.change_vector.clone(),
                                last_modified: item.last_modified.clone(),
                            };
                            doc.original_metadata = Some(doc.metadata.clone());
                            doc.original_value = Some(doc.entity.clone());
                        }
                    }
                }
                "DELETE" => {
                    if let Some(id) = &item.id {
                        self.documents_by_id.remove(id);
                    }
                }
                _ => {
                    // Unrecognized result kinds are accepted but not reconciled into session
                    // state; a forward-compatible fallthrough for unknown "Type" values.
                }
            }
        }

        Ok(())
    }

    fn guard_request_budget(&self) -> Result<()> {
        if self.number_of_requests >= self.conventions.max_number_of_requests_per_session {
            return Err(Error::new(ErrorKind::MaxRequestsExceeded {
                max: self.conventions.max_number_of_requests_per_session,
            }));
        }
        Ok(())
    }

    async fn execute(&self, command: &dyn crate::command::Command, options: RequestOptions) -> Result<Value> {
        let response = self
            .store
            .execute(command, HeaderMap::new(), options)
            .await?;
        Ok(response.body)
    }
}
