use std::collections::HashSet;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::EntityId;
use document_store::{Filter, Session, Update};
use domain::{DomainError, Entity, ItemPhoto, Order, OrderStatus};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::write_error;

pub const ORDERS: &str = "orders";
pub const ITEM_PHOTOS: &str = "item_photos";

/// Selects one order by ID, optionally narrowed by owner, host and status.
///
/// The narrowing fields double as preconditions: an update filtered by
/// `status` does nothing when another transaction moved the order first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderFilter {
    pub order_id: EntityId,
    pub customer_id: Option<EntityId>,
    pub host_id: Option<EntityId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn by_id(order_id: EntityId) -> Self {
        Self {
            order_id,
            customer_id: None,
            host_id: None,
            status: None,
        }
    }

    pub fn owned_by(mut self, customer_id: EntityId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn hosted_by(mut self, host_id: EntityId) -> Self {
        self.host_id = Some(host_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn to_filter(self) -> Filter {
        let mut filter = Filter::by_id(self.order_id);
        if let Some(customer_id) = self.customer_id {
            filter = filter.field("customer_id", customer_id.to_string());
        }
        if let Some(host_id) = self.host_id {
            filter = filter.field("host_id", host_id.to_string());
        }
        if let Some(status) = self.status {
            filter = filter.field("status", json!(status));
        }
        filter
    }

    fn context(self) -> Value {
        let mut context = json!({ "order_id": self.order_id });
        if let Some(customer_id) = self.customer_id {
            context["customer_id"] = json!(customer_id);
        }
        if let Some(host_id) = self.host_id {
            context["host_id"] = json!(host_id);
        }
        if let Some(status) = self.status {
            context["status"] = json!(status);
        }
        context
    }

    fn not_found(self) -> DomainError {
        DomainError::not_found(format!("Order (id: {}) not found", self.order_id))
            .with_context(self.context())
    }

    /// Explains a conditional write that matched nothing.
    ///
    /// The order is looked up again without the `status` precondition: if it
    /// is still there for the same owner and host, another transaction moved
    /// it first and the write is a `CONFLICT`.
    async fn unmatched(self, session: &dyn Session) -> DomainError {
        let Some(expected) = self.status else {
            return self.not_found();
        };
        let current = OrderFilter {
            status: None,
            ..self
        };
        let document = match session.find_one(ORDERS, &current.to_filter()).await {
            Ok(Some(document)) => document,
            Ok(None) => return self.not_found(),
            Err(e) => return e.into(),
        };
        let status = document.body.get("status").cloned().unwrap_or(Value::Null);
        let mut context = self.context();
        context["status"] = status.clone();
        context["expected_status"] = json!(expected);
        DomainError::conflict(format!(
            "Order (id: {}) is no longer in {expected} status",
            self.order_id
        ))
        .with_context(context)
    }
}

/// Top-level order fields that [`OrderRepository::set_properties`] can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Status,
    HostId,
    OriginCountry,
    Destination,
    Items,
    ShipmentRate,
    ShipmentInfo,
    FinalizedAt,
    PaidAt,
    RejectedAt,
}

impl OrderField {
    pub fn path(&self) -> &'static str {
        match self {
            OrderField::Status => "status",
            OrderField::HostId => "host_id",
            OrderField::OriginCountry => "origin_country",
            OrderField::Destination => "destination",
            OrderField::Items => "items",
            OrderField::ShipmentRate => "shipment_rate",
            OrderField::ShipmentInfo => "shipment_info",
            OrderField::FinalizedAt => "finalized_at",
            OrderField::PaidAt => "paid_at",
            OrderField::RejectedAt => "rejected_at",
        }
    }
}

/// A partial order update, taken from an already mutated aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderProperties {
    values: Vec<(OrderField, Value)>,
}

impl OrderProperties {
    /// Copies `fields` from the current state of `order`.
    pub fn from_order(order: &Order, fields: &[OrderField]) -> Result<Self, DomainError> {
        let record = order.to_record()?;
        let values = fields
            .iter()
            .map(|field| {
                let value = record.get(field.path()).cloned().unwrap_or(Value::Null);
                (*field, value)
            })
            .collect();
        Ok(Self { values })
    }

    pub fn fields(&self) -> impl Iterator<Item = OrderField> + '_ {
        self.values.iter().map(|(field, _)| *field)
    }

    fn to_update(&self) -> Update {
        self.values
            .iter()
            .fold(Update::new(), |update, (field, value)| {
                update.set(field.path(), value.clone())
            })
    }
}

/// Persistence of orders and their item photos.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn add_order(&self, session: &dyn Session, order: &Order) -> Result<(), DomainError>;

    /// Fails with `ENTITY_NOT_FOUND` when nothing matches the whole filter.
    async fn find_order(
        &self,
        session: &dyn Session,
        filter: OrderFilter,
    ) -> Result<Order, DomainError>;

    /// Returns every requested order or fails naming the missing ones.
    async fn find_orders(
        &self,
        session: &dyn Session,
        order_ids: &[EntityId],
    ) -> Result<Vec<Order>, DomainError>;

    /// Writes `properties` on the order matching `filter`.
    async fn set_properties(
        &self,
        session: &dyn Session,
        filter: OrderFilter,
        properties: &OrderProperties,
    ) -> Result<(), DomainError>;

    async fn delete_order(&self, session: &dyn Session, filter: OrderFilter)
    -> Result<(), DomainError>;

    async fn add_item_photos(
        &self,
        session: &dyn Session,
        photos: &[ItemPhoto],
    ) -> Result<(), DomainError>;
}

/// Stored form of an [`ItemPhoto`]; the bytes are base64 encoded.
#[derive(Debug, Serialize, Deserialize)]
struct PhotoRecord {
    order_id: EntityId,
    item_id: EntityId,
    file_name: String,
    content_type: String,
    data: String,
}

impl From<&ItemPhoto> for PhotoRecord {
    fn from(photo: &ItemPhoto) -> Self {
        Self {
            order_id: photo.order_id,
            item_id: photo.item_id,
            file_name: photo.file_name.clone(),
            content_type: photo.content_type.clone(),
            data: STANDARD.encode(&photo.data),
        }
    }
}

/// [`OrderRepository`] backed by the `orders` and `item_photos` collections.
#[derive(Debug, Clone, Default)]
pub struct DocumentOrderRepository;

impl DocumentOrderRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrderRepository for DocumentOrderRepository {
    async fn add_order(&self, session: &dyn Session, order: &Order) -> Result<(), DomainError> {
        let record = order.to_record()?;
        session
            .insert_one(ORDERS, order.id(), record)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to add order (id: {})", order.id()),
                    json!({ "order_id": order.id(), "customer_id": order.customer_id() }),
                )
            })
    }

    async fn find_order(
        &self,
        session: &dyn Session,
        filter: OrderFilter,
    ) -> Result<Order, DomainError> {
        let document = session
            .find_one(ORDERS, &filter.to_filter())
            .await?
            .ok_or_else(|| filter.not_found())?;
        Ok(Order::from_record(document.body)?)
    }

    async fn find_orders(
        &self,
        session: &dyn Session,
        order_ids: &[EntityId],
    ) -> Result<Vec<Order>, DomainError> {
        let documents = session
            .find_many(ORDERS, &Filter::by_ids(order_ids.iter().copied()))
            .await?;

        let found: HashSet<EntityId> = documents.iter().map(|doc| doc.id).collect();
        let mut failed: Vec<EntityId> = Vec::new();
        for id in order_ids {
            if !found.contains(id) && !failed.contains(id) {
                failed.push(*id);
            }
        }
        if !failed.is_empty() {
            let ids = failed.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            return Err(DomainError::not_found(format!("Orders (ids: {ids}) not found"))
                .with_context(json!({ "order_ids": order_ids, "failed_order_ids": failed })));
        }

        documents
            .into_iter()
            .map(|doc| Order::from_record(doc.body).map_err(DomainError::from))
            .collect()
    }

    async fn set_properties(
        &self,
        session: &dyn Session,
        filter: OrderFilter,
        properties: &OrderProperties,
    ) -> Result<(), DomainError> {
        let result = session
            .update_one(ORDERS, &filter.to_filter(), &properties.to_update())
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to update order (id: {})", filter.order_id),
                    filter.context(),
                )
            })?;
        if result.matched == 0 {
            return Err(filter.unmatched(session).await);
        }
        Ok(())
    }

    async fn delete_order(
        &self,
        session: &dyn Session,
        filter: OrderFilter,
    ) -> Result<(), DomainError> {
        let deleted = session
            .delete_one(ORDERS, &filter.to_filter())
            .await
            .map_err(|e| {
                write_error(
                    e,
                    format!("Failed to delete order (id: {})", filter.order_id),
                    filter.context(),
                )
            })?;
        if deleted == 0 {
            return Err(filter.unmatched(session).await);
        }
        Ok(())
    }

    async fn add_item_photos(
        &self,
        session: &dyn Session,
        photos: &[ItemPhoto],
    ) -> Result<(), DomainError> {
        try_join_all(photos.iter().map(|photo| async move {
            let record = serde_json::to_value(PhotoRecord::from(photo))?;
            session
                .insert_one(ITEM_PHOTOS, photo.id, record)
                .await
                .map_err(|e| {
                    write_error(
                        e,
                        format!("Failed to add photo to item {}", photo.item_id),
                        json!({
                            "order_id": photo.order_id,
                            "item_id": photo.item_id,
                            "photo_id": photo.id,
                        }),
                    )
                })
        }))
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use document_store::{DocumentStore, InMemoryDocumentStore};
    use domain::{Address, Country, ErrorCode, NewItem, OrderDraft};

    use super::*;

    async fn drafted_order() -> Order {
        let destination = Address::new(Country::new("GB").unwrap(), "1 High St", "London");
        OrderDraft::new(
            EntityId::new(),
            Country::new("US").unwrap(),
            destination,
            vec![NewItem::new("Boots", "Shoe Shop", 1200)],
        )
        .draft(|_| async { Ok(domain::Money::from_cents(900)) })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_find_order_respects_owner() {
        let store = InMemoryDocumentStore::new();
        let repo = DocumentOrderRepository::new();
        let order = drafted_order().await;
        let session = store.start_session().await.unwrap();
        repo.add_order(session.as_ref(), &order).await.unwrap();

        let found = repo
            .find_order(
                session.as_ref(),
                OrderFilter::by_id(order.id()).owned_by(order.customer_id()),
            )
            .await
            .unwrap();
        assert_eq!(found, order);

        let err = repo
            .find_order(session.as_ref(), OrderFilter::by_id(order.id()).owned_by(EntityId::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert_eq!(err.message, format!("Order (id: {}) not found", order.id()));
    }

    #[tokio::test]
    async fn test_find_orders_reports_missing_ids() {
        let store = InMemoryDocumentStore::new();
        let repo = DocumentOrderRepository::new();
        let order = drafted_order().await;
        let missing = EntityId::new();
        let session = store.start_session().await.unwrap();
        repo.add_order(session.as_ref(), &order).await.unwrap();

        let err = repo
            .find_orders(session.as_ref(), &[order.id(), missing])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert_eq!(err.message, format!("Orders (ids: {missing}) not found"));
        assert_eq!(err.context["failed_order_ids"], json!([missing]));

        let orders = repo.find_orders(session.as_ref(), &[order.id()]).await.unwrap();
        assert_eq!(orders.len(), 1);
    }

    #[tokio::test]
    async fn test_set_properties_requires_status_match() {
        let store = InMemoryDocumentStore::new();
        let repo = DocumentOrderRepository::new();
        let mut order = drafted_order().await;
        let session = store.start_session().await.unwrap();
        repo.add_order(session.as_ref(), &order).await.unwrap();

        order.confirm(EntityId::new(), chrono::Utc::now()).unwrap();
        let properties = OrderProperties::from_order(
            &order,
            &[OrderField::Status, OrderField::HostId, OrderField::FinalizedAt],
        )
        .unwrap();

        let err = repo
            .set_properties(
                session.as_ref(),
                OrderFilter::by_id(order.id()).with_status(OrderStatus::Finalized),
                &properties,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(err.context["status"], json!(OrderStatus::Drafted));
        assert_eq!(err.context["expected_status"], json!(OrderStatus::Finalized));

        let err = repo
            .set_properties(
                session.as_ref(),
                OrderFilter::by_id(EntityId::new()).with_status(OrderStatus::Drafted),
                &properties,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);

        let err = repo
            .set_properties(
                session.as_ref(),
                OrderFilter::by_id(order.id())
                    .owned_by(EntityId::new())
                    .with_status(OrderStatus::Drafted),
                &properties,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);

        repo.set_properties(
            session.as_ref(),
            OrderFilter::by_id(order.id()).with_status(OrderStatus::Drafted),
            &properties,
        )
        .await
        .unwrap();

        let stored = repo
            .find_order(session.as_ref(), OrderFilter::by_id(order.id()))
            .await
            .unwrap();
        assert_eq!(stored.status(), OrderStatus::Finalized);
        assert_eq!(stored.host_id(), order.host_id());
    }

    #[tokio::test]
    async fn test_item_photos_are_stored_base64() {
        let store = InMemoryDocumentStore::new();
        let repo = DocumentOrderRepository::new();
        let photo =
            ItemPhoto::new(EntityId::new(), EntityId::new(), "a.jpg", "image/jpeg", vec![1, 2, 3]);
        let session = store.start_session().await.unwrap();
        repo.add_item_photos(session.as_ref(), std::slice::from_ref(&photo))
            .await
            .unwrap();
        session.commit().await.unwrap();

        let body = store.get(ITEM_PHOTOS, photo.id).await.unwrap();
        assert_eq!(body["data"], "AQID");
        assert_eq!(body["file_name"], "a.jpg");
    }
}
