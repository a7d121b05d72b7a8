use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Document, EntityId, Filter, Result, StoreError, Update, UpdateResult};

/// Entry point to a document store.
///
/// Implementations must be thread-safe (Send + Sync); one store is shared by
/// every request.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a new session with an active transaction.
    async fn start_session(&self) -> Result<Arc<dyn Session>>;
}

/// A unit of work against the store.
///
/// Writes made through a session are only visible to that session until
/// [`Session::commit`] succeeds; [`Session::abort`] discards them. A session
/// may be shared by concurrently running futures of the same use case, which
/// is why every method takes `&self`.
#[async_trait]
pub trait Session: Send + Sync {
    /// Inserts a new document. Fails with `DuplicateKey` if the ID is taken.
    async fn insert_one(&self, collection: &str, id: EntityId, body: Value) -> Result<()>;

    /// Returns the first document matching the filter.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Returns every document matching the filter.
    async fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// The match and the write happen atomically with respect to other
    /// sessions: a document that stops matching before commit is not written.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult>;

    /// Deletes the first document matching the filter. Returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Makes every write of this session visible atomically.
    async fn commit(&self) -> Result<()>;

    /// Discards every write of this session.
    async fn abort(&self) -> Result<()>;
}

/// Runs `work` inside a new transaction.
///
/// Commits when `work` returns `Ok`, aborts when it returns `Err`. The error of
/// `work` always wins over a failure to abort, which is only logged.
pub async fn with_transaction<T, E, F, Fut>(
    store: &dyn DocumentStore,
    work: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(Arc<dyn Session>) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<StoreError>,
{
    with_transaction_in(store, None, work).await
}

/// Like [`with_transaction`], but joins `existing` when one is given.
///
/// A joined session belongs to the caller: it is neither committed nor
/// aborted here.
pub async fn with_transaction_in<T, E, F, Fut>(
    store: &dyn DocumentStore,
    existing: Option<Arc<dyn Session>>,
    work: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(Arc<dyn Session>) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<StoreError>,
{
    if let Some(session) = existing {
        return work(session).await;
    }

    let session = store.start_session().await?;
    match work(Arc::clone(&session)).await {
        Ok(value) => {
            session.commit().await?;
            metrics::counter!("document_store_transactions_total", "outcome" => "committed")
                .increment(1);
            Ok(value)
        }
        Err(e) => {
            if let Err(abort_err) = session.abort().await {
                tracing::warn!(error = %abort_err, "Failed to abort transaction");
            }
            metrics::counter!("document_store_transactions_total", "outcome" => "aborted")
                .increment(1);
            Err(e)
        }
    }
}
