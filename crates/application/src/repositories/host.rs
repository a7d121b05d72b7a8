use async_trait::async_trait;
use common::EntityId;
use document_store::{Filter, Session, Update};
use domain::{Country, DomainError, Entity, Host};
use serde_json::json;

use super::write_error;

pub const HOSTS: &str = "hosts";

/// Persistence of hosts and the orders assigned to them.
#[async_trait]
pub trait HostRepository: Send + Sync {
    async fn add_host(&self, session: &dyn Session, host: &Host) -> Result<(), DomainError>;

    async fn find_host(&self, session: &dyn Session, host_id: EntityId)
    -> Result<Host, DomainError>;

    /// Hosts flagged available whose address is in `country`.
    async fn find_available_hosts(
        &self,
        session: &dyn Session,
        country: &Country,
    ) -> Result<Vec<Host>, DomainError>;

    async fn add_order_to_host(
        &self,
        session: &dyn Session,
        host_id: EntityId,
        order_id: EntityId,
    ) -> Result<(), DomainError>;

    async fn delete_host(&self, session: &dyn Session, host_id: EntityId)
    -> Result<(), DomainError>;
}

fn not_found(host_id: EntityId) -> DomainError {
    DomainError::not_found(format!("Host (id: {host_id}) not found"))
        .with_context(json!({ "host_id": host_id }))
}

/// [`HostRepository`] backed by the `hosts` collection.
#[derive(Debug, Clone, Default)]
pub struct DocumentHostRepository;

impl DocumentHostRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostRepository for DocumentHostRepository {
    async fn add_host(&self, session: &dyn Session, host: &Host) -> Result<(), DomainError> {
        let record = host.to_record()?;
        session
            .insert_one(HOSTS, host.id, record)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to add host (id: {})", host.id),
                    json!({ "host_id": host.id }),
                )
            })
    }

    async fn find_host(
        &self,
        session: &dyn Session,
        host_id: EntityId,
    ) -> Result<Host, DomainError> {
        let document = session
            .find_one(HOSTS, &Filter::by_id(host_id))
            .await?
            .ok_or_else(|| not_found(host_id))?;
        Ok(Host::from_record(document.body)?)
    }

    async fn find_available_hosts(
        &self,
        session: &dyn Session,
        country: &Country,
    ) -> Result<Vec<Host>, DomainError> {
        let filter = Filter::all()
            .field("available", true)
            .field("address.country", country.as_str());
        session
            .find_many(HOSTS, &filter)
            .await?
            .into_iter()
            .map(|doc| Host::from_record(doc.body).map_err(DomainError::from))
            .collect()
    }

    async fn add_order_to_host(
        &self,
        session: &dyn Session,
        host_id: EntityId,
        order_id: EntityId,
    ) -> Result<(), DomainError> {
        let update = Update::new().push("order_ids", order_id.to_string());
        let result = session
            .update_one(HOSTS, &Filter::by_id(host_id), &update)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to add order {order_id} to host {host_id}"),
                    json!({ "host_id": host_id, "order_id": order_id }),
                )
            })?;
        if result.matched == 0 {
            return Err(not_found(host_id));
        }
        Ok(())
    }

    async fn delete_host(
        &self,
        session: &dyn Session,
        host_id: EntityId,
    ) -> Result<(), DomainError> {
        let deleted = session
            .delete_one(HOSTS, &Filter::by_id(host_id))
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to delete host (id: {host_id})"),
                    json!({ "host_id": host_id }),
                )
            })?;
        if deleted == 0 {
            return Err(not_found(host_id));
        }
        Ok(())
    }
}
