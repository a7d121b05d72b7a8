//! Repositories over the document store.
//!
//! Every method takes the caller's [`Session`](document_store::Session), so
//! the writes of one use case share a single transaction.

mod customer;
mod host;
mod order;

pub use customer::{CUSTOMERS, CustomerRepository, DocumentCustomerRepository};
pub use host::{DocumentHostRepository, HOSTS, HostRepository};
pub use order::{
    DocumentOrderRepository, ITEM_PHOTOS, ORDERS, OrderField, OrderFilter, OrderProperties,
    OrderRepository,
};

use document_store::StoreError;
use domain::DomainError;
use serde_json::{Value, json};

/// Maps a store failure on a write. Conflicts keep their code so callers can
/// retry; anything else becomes an internal error with `message`.
pub(crate) fn write_error(err: StoreError, message: String, mut context: Value) -> DomainError {
    if err.is_transient() {
        return DomainError::from(err);
    }
    if let Value::Object(map) = &mut context {
        map.insert("cause".to_string(), json!(err.to_string()));
    }
    DomainError::internal(message).with_context(context)
}
