use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgPoolOptions, postgres::PgRow};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    Document, EntityId, Filter, Result, StoreError, Update, UpdateResult,
    store::{DocumentStore, Session},
};

/// PostgreSQL-backed document store.
///
/// All collections share one `documents` table keyed by `(collection, id)`
/// with the document body in a JSONB column.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn start_session(&self) -> Result<Arc<dyn Session>> {
        let tx = self.pool.begin().await?;
        Ok(Arc::new(PostgresSession {
            tx: Mutex::new(Some(tx)),
        }))
    }
}

/// Session backed by one database transaction.
pub struct PostgresSession {
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

/// Builds `SELECT id, body ... WHERE ...` for a filter. `$1` is the collection,
/// `$2` the containment object, `$3` the optional ID list.
fn select_sql(filter: &Filter, suffix: &str) -> String {
    let mut sql =
        String::from("SELECT id, body FROM documents WHERE collection = $1 AND body @> $2");
    if filter.ids().is_some() {
        sql.push_str(" AND id = ANY($3)");
    }
    sql.push_str(" ORDER BY id");
    sql.push_str(suffix);
    sql
}

fn filter_ids(filter: &Filter) -> Option<Vec<Uuid>> {
    filter
        .ids()
        .map(|ids| ids.iter().map(EntityId::as_uuid).collect())
}

fn row_to_document(row: PgRow) -> Result<Document> {
    Ok(Document {
        id: EntityId::from_uuid(row.try_get::<Uuid, _>("id")?),
        body: row.try_get::<Value, _>("body")?,
    })
}

impl PostgresSession {
    async fn select(
        &self,
        collection: &str,
        filter: &Filter,
        suffix: &str,
    ) -> Result<Vec<Document>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::SessionClosed)?;

        let sql = select_sql(filter, suffix);
        let mut query = sqlx::query(&sql)
            .bind(collection)
            .bind(filter.containment());
        if let Some(ids) = filter_ids(filter) {
            query = query.bind(ids);
        }

        let rows = query.fetch_all(&mut **tx).await?;
        rows.into_iter().map(row_to_document).collect()
    }
}

#[async_trait]
impl Session for PostgresSession {
    async fn insert_one(&self, collection: &str, id: EntityId, body: Value) -> Result<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::SessionClosed)?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, version)
            VALUES ($1, $2, $3, 1)
            "#,
        )
        .bind(collection)
        .bind(id.as_uuid())
        .bind(&body)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    id,
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self
            .select(collection, filter, " LIMIT 1")
            .await?
            .into_iter()
            .next())
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        self.select(collection, filter, "").await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        // The row lock makes a concurrent writer wait, after which the filter
        // is re-evaluated against the committed row.
        let Some(mut document) = self
            .select(collection, filter, " LIMIT 1 FOR UPDATE")
            .await?
            .into_iter()
            .next()
        else {
            return Ok(UpdateResult::unmatched());
        };

        if !update.apply(&mut document.body)? {
            return Ok(UpdateResult {
                matched: 1,
                modified: 0,
            });
        }

        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::SessionClosed)?;
        sqlx::query(
            r#"
            UPDATE documents SET body = $3, version = version + 1
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(document.id.as_uuid())
        .bind(&document.body)
        .execute(&mut **tx)
        .await?;

        Ok(UpdateResult {
            matched: 1,
            modified: 1,
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let Some(document) = self
            .select(collection, filter, " LIMIT 1 FOR UPDATE")
            .await?
            .into_iter()
            .next()
        else {
            return Ok(0);
        };

        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::SessionClosed)?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(document.id.as_uuid())
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(&self) -> Result<()> {
        let tx = self.tx.lock().await.take().ok_or(StoreError::SessionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn abort(&self) -> Result<()> {
        if let Some(tx) = self.tx.lock().await.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
