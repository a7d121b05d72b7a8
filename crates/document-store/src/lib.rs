//! Document persistence with explicit sessions.
//!
//! Every read and write goes through a [`Session`]. A session groups writes to
//! any number of documents, across collections, into one atomic unit that is
//! either committed or aborted. [`with_transaction`] is the usual entry point.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::EntityId;
pub use document::{Document, Filter, Update, UpdateResult};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use store::{DocumentStore, Session, with_transaction, with_transaction_in};
