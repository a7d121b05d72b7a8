use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::{
    Document, EntityId, Filter, Result, StoreError, Update, UpdateResult,
    store::{DocumentStore, Session},
};

#[derive(Debug, Clone)]
struct StoredDocument {
    body: Value,
    version: u64,
}

type Collections = HashMap<String, BTreeMap<EntityId, StoredDocument>>;
type Key = (String, EntityId);

/// In-memory document store implementation for tests and local runs.
///
/// Sessions stage their writes privately. On commit, every touched document
/// must still carry the version it had when the session first touched it;
/// otherwise the commit fails with `WriteConflict` and nothing is applied.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns the committed body of a document, bypassing sessions.
    pub async fn get(&self, collection: &str, id: EntityId) -> Option<Value> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(&id))
            .map(|doc| doc.body.clone())
    }

    /// Removes every document.
    pub async fn clear(&self) {
        self.collections.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn start_session(&self) -> Result<Arc<dyn Session>> {
        Ok(Arc::new(InMemorySession {
            collections: Arc::clone(&self.collections),
            state: Mutex::new(SessionState::default()),
        }))
    }
}

#[derive(Debug, Clone)]
enum Staged {
    Put(Value),
    Delete,
}

#[derive(Debug, Default)]
struct SessionState {
    closed: bool,
    staged: HashMap<Key, Staged>,
    /// Committed version of each touched document at first touch; `None` if absent.
    base_versions: HashMap<Key, Option<u64>>,
}

impl SessionState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::SessionClosed);
        }
        Ok(())
    }

    fn stage(&mut self, committed: &Collections, key: Key, write: Staged) {
        let base = committed
            .get(&key.0)
            .and_then(|docs| docs.get(&key.1))
            .map(|doc| doc.version);
        self.base_versions.entry(key.clone()).or_insert(base);
        self.staged.insert(key, write);
    }

    /// Committed documents of a collection overlaid with this session's writes.
    fn view(&self, committed: &Collections, collection: &str) -> BTreeMap<EntityId, Value> {
        let mut docs: BTreeMap<EntityId, Value> = committed
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (*id, doc.body.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for ((name, id), write) in &self.staged {
            if name != collection {
                continue;
            }
            match write {
                Staged::Put(body) => {
                    docs.insert(*id, body.clone());
                }
                Staged::Delete => {
                    docs.remove(id);
                }
            }
        }
        docs
    }

    fn close(&mut self) {
        self.closed = true;
        self.staged.clear();
        self.base_versions.clear();
    }
}

/// Session over an [`InMemoryDocumentStore`].
pub struct InMemorySession {
    collections: Arc<RwLock<Collections>>,
    state: Mutex<SessionState>,
}

#[async_trait]
impl Session for InMemorySession {
    async fn insert_one(&self, collection: &str, id: EntityId, body: Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let committed = self.collections.read().await;

        if state.view(&committed, collection).contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                id,
            });
        }
        state.stage(&committed, (collection.to_string(), id), Staged::Put(body));
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let state = self.state.lock().await;
        state.ensure_open()?;
        let committed = self.collections.read().await;

        Ok(state
            .view(&committed, collection)
            .into_iter()
            .find(|(id, body)| filter.matches(*id, body))
            .map(|(id, body)| Document::new(id, body)))
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let state = self.state.lock().await;
        state.ensure_open()?;
        let committed = self.collections.read().await;

        Ok(state
            .view(&committed, collection)
            .into_iter()
            .filter(|(id, body)| filter.matches(*id, body))
            .map(|(id, body)| Document::new(id, body))
            .collect())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let committed = self.collections.read().await;

        let Some((id, mut body)) = state
            .view(&committed, collection)
            .into_iter()
            .find(|(id, body)| filter.matches(*id, body))
        else {
            return Ok(UpdateResult::unmatched());
        };

        let key = (collection.to_string(), id);
        if !update.apply(&mut body)? {
            // Unchanged documents still take part in the commit-time version check.
            state.base_versions.entry(key).or_insert_with(|| {
                committed
                    .get(collection)
                    .and_then(|docs| docs.get(&id))
                    .map(|doc| doc.version)
            });
            return Ok(UpdateResult {
                matched: 1,
                modified: 0,
            });
        }

        state.stage(&committed, key, Staged::Put(body));
        Ok(UpdateResult {
            matched: 1,
            modified: 1,
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let committed = self.collections.read().await;

        let Some(id) = state
            .view(&committed, collection)
            .into_iter()
            .find(|(id, body)| filter.matches(*id, body))
            .map(|(id, _)| id)
        else {
            return Ok(0);
        };

        state.stage(&committed, (collection.to_string(), id), Staged::Delete);
        Ok(1)
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let mut committed = self.collections.write().await;

        let conflict = state
            .base_versions
            .iter()
            .find(|((collection, id), base)| {
                let current = committed
                    .get(collection)
                    .and_then(|docs| docs.get(id))
                    .map(|doc| doc.version);
                current != **base
            })
            .map(|(key, _)| key.clone());

        if let Some((collection, id)) = conflict {
            tracing::debug!(%collection, %id, "Write conflict on commit");
            state.close();
            return Err(StoreError::WriteConflict { collection, id });
        }

        let staged = std::mem::take(&mut state.staged);
        for ((collection, id), write) in staged {
            let docs = committed.entry(collection).or_default();
            match write {
                Staged::Put(body) => {
                    let version = docs.get(&id).map_or(1, |doc| doc.version + 1);
                    docs.insert(id, StoredDocument { body, version });
                }
                Staged::Delete => {
                    docs.remove(&id);
                }
            }
        }

        state.close();
        Ok(())
    }

    async fn abort(&self) -> Result<()> {
        self.state.lock().await.close();
        Ok(())
    }
}
