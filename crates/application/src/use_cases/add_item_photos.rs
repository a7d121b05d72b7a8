use std::sync::Arc;
use std::time::Instant;

use common::EntityId;
use document_store::{DocumentStore, with_transaction};
use domain::{DomainError, ItemPhoto, OrderStatus};
use serde_json::json;

use super::record_duration;
use crate::events::EventBus;
use crate::repositories::{OrderField, OrderFilter, OrderProperties, OrderRepository};

/// An uploaded photo file.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AddItemPhotosRequest {
    pub host_id: EntityId,
    pub order_id: EntityId,
    pub item_id: EntityId,
    pub photos: Vec<PhotoUpload>,
}

/// Host attaches photos to an item of a finalized order.
pub struct AddItemPhotos {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn EventBus>,
}

impl AddItemPhotos {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orders: Arc<dyn OrderRepository>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            orders,
            events,
        }
    }

    /// Stores the photos and links them to the item. Returns the new photo IDs.
    #[tracing::instrument(
        skip(self, request),
        fields(
            order_id = %request.order_id,
            item_id = %request.item_id,
            photos = request.photos.len()
        )
    )]
    pub async fn execute(
        &self,
        request: AddItemPhotosRequest,
    ) -> Result<Vec<EntityId>, DomainError> {
        if request.photos.is_empty() {
            return Err(DomainError::validation("At least one photo is required")
                .with_context(json!({
                    "order_id": request.order_id,
                    "item_id": request.item_id,
                })));
        }
        let started = Instant::now();
        let filter = OrderFilter::by_id(request.order_id).hosted_by(request.host_id);
        let photos: Vec<ItemPhoto> = request
            .photos
            .into_iter()
            .map(|upload| {
                ItemPhoto::new(
                    request.order_id,
                    request.item_id,
                    upload.file_name,
                    upload.content_type,
                    upload.data,
                )
            })
            .collect();
        let photo_ids: Vec<EntityId> = photos.iter().map(|photo| photo.id).collect();

        let event = with_transaction(self.store.as_ref(), |session| {
            let photos = &photos;
            let photo_ids = photo_ids.clone();
            async move {
                let mut order = self.orders.find_order(session.as_ref(), filter).await?;
                let event = order.add_item_photos(request.item_id, photo_ids)?;
                let properties = OrderProperties::from_order(&order, &[OrderField::Items])?;

                tokio::try_join!(
                    self.orders.add_item_photos(session.as_ref(), photos),
                    self.orders.set_properties(
                        session.as_ref(),
                        filter.with_status(OrderStatus::Finalized),
                        &properties,
                    ),
                )?;
                Ok::<_, DomainError>(event)
            }
        })
        .await?;

        self.events.publish(event);
        record_duration("add_item_photos", started);
        tracing::info!("item photos added");

        Ok(photo_ids)
    }
}
