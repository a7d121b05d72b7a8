//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p document-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use document_store::{
    DocumentStore, EntityId, Filter, PostgresDocumentStore, StoreError, Update, with_transaction,
};
use serde_json::json;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_documents_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;
    let store = PostgresDocumentStore::connect(&info.connection_string, 5)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents")
        .execute(store.pool())
        .await
        .unwrap();

    store
}

#[tokio::test]
async fn insert_and_find_document() {
    let store = get_test_store().await;
    let id = EntityId::new();

    let session = store.start_session().await.unwrap();
    session
        .insert_one("orders", id, json!({"status": "Drafted"}))
        .await
        .unwrap();
    session.commit().await.unwrap();

    let session = store.start_session().await.unwrap();
    let found = session
        .find_one("orders", &Filter::by_id(id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.body["status"], "Drafted");
}

#[tokio::test]
async fn duplicate_insert_is_reported() {
    let store = get_test_store().await;
    let id = EntityId::new();

    let session = store.start_session().await.unwrap();
    session.insert_one("orders", id, json!({})).await.unwrap();
    session.commit().await.unwrap();

    let session = store.start_session().await.unwrap();
    let err = session.insert_one("orders", id, json!({})).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
}

#[tokio::test]
async fn aborted_transaction_leaves_no_trace() {
    let store = get_test_store().await;
    let id = EntityId::new();

    let result: Result<(), StoreError> = with_transaction(&store, |session| async move {
        session.insert_one("orders", id, json!({})).await?;
        Err(StoreError::SessionClosed)
    })
    .await;
    assert!(result.is_err());

    let session = store.start_session().await.unwrap();
    assert!(
        session
            .find_one("orders", &Filter::by_id(id))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn conditional_update_and_containment_filter() {
    let store = get_test_store().await;
    let id = EntityId::new();

    let session = store.start_session().await.unwrap();
    session
        .insert_one(
            "orders",
            id,
            json!({"status": "Finalized", "destination": {"country": "US"}}),
        )
        .await
        .unwrap();
    session.commit().await.unwrap();

    let session = store.start_session().await.unwrap();
    let filter = Filter::by_id(id)
        .field("status", "Finalized")
        .field("destination.country", "US");
    let result = session
        .update_one("orders", &filter, &Update::new().set("status", "Paid"))
        .await
        .unwrap();
    assert_eq!(result.matched, 1);
    session.commit().await.unwrap();

    let session = store.start_session().await.unwrap();
    let again = session
        .update_one("orders", &filter, &Update::new().set("status", "Paid"))
        .await
        .unwrap();
    assert_eq!(again.matched, 0);
}

#[tokio::test]
async fn overlapping_conditional_updates_leave_one_winner() {
    let store = get_test_store().await;
    let id = EntityId::new();

    let session = store.start_session().await.unwrap();
    session
        .insert_one("orders", id, json!({"status": "Finalized"}))
        .await
        .unwrap();
    session.commit().await.unwrap();

    let filter = Filter::by_id(id).field("status", "Finalized");
    let pay = Update::new().set("status", "Paid");
    let winner = store.start_session().await.unwrap();
    let loser = store.start_session().await.unwrap();
    assert!(loser.find_one("orders", &filter).await.unwrap().is_some());

    let won = winner.update_one("orders", &filter, &pay).await.unwrap();
    assert_eq!(won.matched, 1);

    // The loser blocks on the row lock until the winner commits.
    let (lost, committed) = tokio::join!(loser.update_one("orders", &filter, &pay), async {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        winner.commit().await
    });
    committed.unwrap();
    assert_eq!(lost.unwrap().matched, 0);

    let current = loser
        .find_one("orders", &Filter::by_id(id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.body["status"], "Paid");
    loser.abort().await.unwrap();
}

#[tokio::test]
async fn find_many_by_ids_and_delete() {
    let store = get_test_store().await;
    let ids: Vec<EntityId> = (0..3).map(|_| EntityId::new()).collect();

    let session = store.start_session().await.unwrap();
    for id in &ids {
        session.insert_one("orders", *id, json!({})).await.unwrap();
    }
    session.commit().await.unwrap();

    let session = store.start_session().await.unwrap();
    let found = session
        .find_many("orders", &Filter::by_ids(ids[..2].to_vec()))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    assert_eq!(
        session
            .delete_one("orders", &Filter::by_id(ids[0]))
            .await
            .unwrap(),
        1
    );
    session.commit().await.unwrap();

    let session = store.start_session().await.unwrap();
    let remaining = session.find_many("orders", &Filter::all()).await.unwrap();
    assert_eq!(remaining.len(), 2);
}
