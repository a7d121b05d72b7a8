//! Domain layer for the order lifecycle service.
//!
//! This crate provides:
//! - Entity and DomainEvent capability traits
//! - Value objects (Country, Address, Money)
//! - Customer and Host entities
//! - Order entity with its lifecycle state machine and events
//! - The structured error every layer propagates

pub mod customer;
pub mod entity;
pub mod error;
pub mod host;
pub mod order;
pub mod value_objects;

pub use common::EntityId;
pub use customer::Customer;
pub use entity::{DomainEvent, Entity};
pub use error::{DomainError, ErrorCode};
pub use host::Host;
pub use order::{
    Item, ItemPhoto, NewItem, Order, OrderDraft, OrderEdit, OrderError, OrderEvent, OrderStatus,
    RejectionReason, ShipmentCostRequest, ShipmentInfo,
};
pub use value_objects::{Address, Country, Money};
