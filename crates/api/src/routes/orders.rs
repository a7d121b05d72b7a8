//! Order lifecycle endpoints for customers and hosts.

use std::sync::Arc;

use application::{
    AddItemPhotosRequest, CheckoutSession, ConfirmOrderRequest, CreateOrderRequest,
    DeleteOrderRequest, EditOrderRequest, GetOrderRequest, PayShipmentRequest, PhotoUpload,
    ReceiveItemRequest, SubmitShipmentInfoRequest,
};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::EntityId;
use domain::{Address, Country, Money, NewItem, Order, OrderEdit, ShipmentInfo};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::identity::{CustomerIdentity, VerifiedHostIdentity};
use crate::state::AppState;

type JsonBody<T> = Result<Json<T>, JsonRejection>;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub origin_country: Country,
    pub items: Vec<NewItem>,
}

#[derive(Debug, Deserialize)]
pub struct EditOrderBody {
    pub order_id: EntityId,
    #[serde(default)]
    pub origin_country: Option<Country>,
    #[serde(default)]
    pub destination: Option<Address>,
    #[serde(default)]
    pub items: Option<Vec<NewItem>>,
}

/// Body of every request that only names an order.
#[derive(Debug, Deserialize)]
pub struct OrderIdBody {
    pub order_id: EntityId,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveItemBody {
    pub order_id: EntityId,
    pub item_id: EntityId,
}

#[derive(Debug, Deserialize)]
pub struct SubmitShipmentInfoBody {
    pub order_id: EntityId,
    pub shipment_cost_cents: i64,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ReceiveItemResponse {
    pub received_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AddItemPhotosResponse {
    pub photo_ids: Vec<EntityId>,
}

// -- Handlers --

/// POST /order: draft an order to the customer's selected address.
#[tracing::instrument(skip(state, body), fields(customer_id = %customer_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    body: JsonBody<CreateOrderBody>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(body) = body?;
    let order = state
        .create_order
        .execute(CreateOrderRequest {
            customer_id,
            origin_country: body.origin_country,
            items: body.items,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// PATCH /order: change the origin, destination or items of a drafted order.
#[tracing::instrument(skip(state, body), fields(customer_id = %customer_id))]
pub async fn edit(
    State(state): State<Arc<AppState>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    body: JsonBody<EditOrderBody>,
) -> Result<Json<Order>, ApiError> {
    let Json(body) = body?;
    let order = state
        .edit_order
        .execute(EditOrderRequest {
            customer_id,
            order_id: body.order_id,
            edit: OrderEdit {
                origin_country: body.origin_country,
                destination: body.destination,
                items: body.items,
            },
        })
        .await?;

    Ok(Json(order))
}

/// DELETE /order: remove a drafted order.
#[tracing::instrument(skip(state, body), fields(customer_id = %customer_id))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    body: JsonBody<OrderIdBody>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body?;
    state
        .delete_order
        .execute(DeleteOrderRequest {
            customer_id,
            order_id: body.order_id,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /order/{id}: load one of the customer's orders.
#[tracing::instrument(skip(state), fields(customer_id = %customer_id))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_id(&id)?;
    let order = state
        .get_order
        .execute(GetOrderRequest {
            customer_id,
            order_id,
        })
        .await?;

    Ok(Json(order))
}

/// POST /order/confirm: match a host and open the service-fee checkout.
#[tracing::instrument(skip(state, body), fields(customer_id = %customer_id))]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    body: JsonBody<OrderIdBody>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let Json(body) = body?;
    let session = state
        .confirm_order
        .execute(ConfirmOrderRequest {
            customer_id,
            order_id: body.order_id,
        })
        .await?;

    Ok(Json(session))
}

/// POST /order/receiveItem: host marks an item as delivered to them.
#[tracing::instrument(skip(state, body), fields(host_id = %host_id))]
pub async fn receive_item(
    State(state): State<Arc<AppState>>,
    VerifiedHostIdentity(host_id): VerifiedHostIdentity,
    body: JsonBody<ReceiveItemBody>,
) -> Result<Json<ReceiveItemResponse>, ApiError> {
    let Json(body) = body?;
    let received_date = state
        .receive_item
        .execute(ReceiveItemRequest {
            host_id,
            order_id: body.order_id,
            item_id: body.item_id,
        })
        .await?;

    Ok(Json(ReceiveItemResponse { received_date }))
}

/// POST /order/addItemPhotos: multipart form with `order_id`, `item_id` and
/// one or more `photos` files.
#[tracing::instrument(skip(state, multipart), fields(host_id = %host_id))]
pub async fn add_item_photos(
    State(state): State<Arc<AppState>>,
    VerifiedHostIdentity(host_id): VerifiedHostIdentity,
    mut multipart: Multipart,
) -> Result<Json<AddItemPhotosResponse>, ApiError> {
    let mut order_id = None;
    let mut item_id = None;
    let mut photos = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("order_id") => order_id = Some(parse_id(&field.text().await?)?),
            Some("item_id") => item_id = Some(parse_id(&field.text().await?)?),
            Some("photos") => {
                let file_name = field.file_name().unwrap_or("photo").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                if !content_type.starts_with("image/") {
                    return Err(ApiError::BadRequest(format!(
                        "Photo {file_name} has unsupported content type {content_type}"
                    )));
                }
                let data = field.bytes().await?.to_vec();
                photos.push(PhotoUpload {
                    file_name,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    let order_id = order_id.ok_or_else(|| ApiError::BadRequest("Missing order_id".into()))?;
    let item_id = item_id.ok_or_else(|| ApiError::BadRequest("Missing item_id".into()))?;
    let photo_ids = state
        .add_item_photos
        .execute(AddItemPhotosRequest {
            host_id,
            order_id,
            item_id,
            photos,
        })
        .await?;

    Ok(Json(AddItemPhotosResponse { photo_ids }))
}

/// POST /order/submitShipmentInfo: host reports the final shipment cost.
#[tracing::instrument(skip(state, body), fields(host_id = %host_id))]
pub async fn submit_shipment_info(
    State(state): State<Arc<AppState>>,
    VerifiedHostIdentity(host_id): VerifiedHostIdentity,
    body: JsonBody<SubmitShipmentInfoBody>,
) -> Result<Json<ShipmentInfo>, ApiError> {
    let Json(body) = body?;
    let tracking_number = body
        .tracking_number
        .map(|number| number.trim().to_string())
        .filter(|number| !number.is_empty());
    let info = state
        .submit_shipment_info
        .execute(SubmitShipmentInfoRequest {
            host_id,
            order_id: body.order_id,
            cost: Money::from_cents(body.shipment_cost_cents),
            tracking_number,
        })
        .await?;

    Ok(Json(info))
}

/// POST /order/payShipment: open the shipment-fee checkout.
#[tracing::instrument(skip(state, body), fields(customer_id = %customer_id))]
pub async fn pay_shipment(
    State(state): State<Arc<AppState>>,
    CustomerIdentity(customer_id): CustomerIdentity,
    body: JsonBody<OrderIdBody>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let Json(body) = body?;
    let session = state
        .pay_shipment
        .execute(PayShipmentRequest {
            customer_id,
            order_id: body.order_id,
        })
        .await?;

    Ok(Json(session))
}

fn parse_id(id: &str) -> Result<EntityId, ApiError> {
    id.trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
