use async_trait::async_trait;
use common::EntityId;
use document_store::{Filter, Session, Update};
use domain::{Customer, DomainError, Entity};
use serde_json::json;

use super::write_error;

pub const CUSTOMERS: &str = "customers";

/// Persistence of customers and the order IDs they own.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn add_customer(&self, session: &dyn Session, customer: &Customer)
    -> Result<(), DomainError>;

    async fn find_customer(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
    ) -> Result<Customer, DomainError>;

    async fn add_order_to_customer(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
        order_id: EntityId,
    ) -> Result<(), DomainError>;

    async fn remove_order_from_customer(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
        order_id: EntityId,
    ) -> Result<(), DomainError>;

    async fn delete_customer(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
    ) -> Result<(), DomainError>;
}

fn not_found(customer_id: EntityId) -> DomainError {
    DomainError::not_found(format!("Customer (id: {customer_id}) not found"))
        .with_context(json!({ "customer_id": customer_id }))
}

/// [`CustomerRepository`] backed by the `customers` collection.
#[derive(Debug, Clone, Default)]
pub struct DocumentCustomerRepository;

impl DocumentCustomerRepository {
    pub fn new() -> Self {
        Self
    }

    async fn update(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
        update: Update,
        action: &str,
    ) -> Result<(), DomainError> {
        let result = session
            .update_one(CUSTOMERS, &Filter::by_id(customer_id), &update)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to {action} (customer id: {customer_id})"),
                    json!({ "customer_id": customer_id }),
                )
            })?;
        if result.matched == 0 {
            return Err(not_found(customer_id));
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for DocumentCustomerRepository {
    async fn add_customer(
        &self,
        session: &dyn Session,
        customer: &Customer,
    ) -> Result<(), DomainError> {
        let record = customer.to_record()?;
        session
            .insert_one(CUSTOMERS, customer.id, record)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to add customer (id: {})", customer.id),
                    json!({ "customer_id": customer.id }),
                )
            })
    }

    async fn find_customer(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
    ) -> Result<Customer, DomainError> {
        let document = session
            .find_one(CUSTOMERS, &Filter::by_id(customer_id))
            .await?
            .ok_or_else(|| not_found(customer_id))?;
        Ok(Customer::from_record(document.body)?)
    }

    async fn add_order_to_customer(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
        order_id: EntityId,
    ) -> Result<(), DomainError> {
        let update = Update::new().push("order_ids", order_id.to_string());
        self.update(session, customer_id, update, &format!("add order {order_id}"))
            .await
    }

    async fn remove_order_from_customer(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
        order_id: EntityId,
    ) -> Result<(), DomainError> {
        let update = Update::new().pull("order_ids", order_id.to_string());
        self.update(session, customer_id, update, &format!("remove order {order_id}"))
            .await
    }

    async fn delete_customer(
        &self,
        session: &dyn Session,
        customer_id: EntityId,
    ) -> Result<(), DomainError> {
        let deleted = session
            .delete_one(CUSTOMERS, &Filter::by_id(customer_id))
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to delete customer (id: {customer_id})"),
                    json!({ "customer_id": customer_id }),
                )
            })?;
        if deleted == 0 {
            return Err(not_found(customer_id));
        }
        Ok(())
    }
}
