//! Order placement, retrieval, and status transition endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId, UserId};
use domain::{LineItem, OrderRequest, OrderStatus, OrderWithItems, RequestedItem, Role};
use serde::{Deserialize, Serialize};
use store::OrderStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub intake: S,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub items: Vec<ItemRequest>,
}

#[derive(Deserialize)]
pub struct ItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

/// Identity is resolved upstream; the handler trusts the supplied role.
#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    pub role: Role,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub items: Vec<LineItemResponse>,
}

#[derive(Serialize)]
pub struct LineItemResponse {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl From<OrderWithItems> for OrderResponse {
    fn from(placed: OrderWithItems) -> Self {
        Self {
            id: placed.order.id,
            user_id: placed.order.user_id,
            status: placed.order.status,
            total_cents: placed.order.total.cents(),
            created_at: placed.order.created_at,
            updated_at: placed.order.updated_at,
            items: placed.items.iter().map(LineItemResponse::from).collect(),
        }
    }
}

impl From<&LineItem> for LineItemResponse {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            subtotal_cents: item.subtotal().cents(),
        }
    }
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub id: OrderId,
    pub status: OrderStatus,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

// -- Handlers --

/// POST /orders — place a new order.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let user_id = UserId::from_uuid(parse_uuid(&req.user_id, "user_id")?);

    let mut items = Vec::with_capacity(req.items.len());
    for item in &req.items {
        items.push(RequestedItem::new(
            ProductId::from_uuid(parse_uuid(&item.product_id, "product_id")?),
            item.quantity,
        ));
    }

    let placed = state
        .intake
        .place_order(user_id, OrderRequest::new(items))
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(placed))))
}

/// GET /orders/:id — load an order with its line items.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid(&id, "order id")?);

    let placed = state
        .intake
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::Intake(store::IntakeError::OrderNotFound(order_id)))?;

    Ok(Json(OrderResponse::from(placed)))
}

/// PATCH /orders/:id/status — transition an order's status.
#[tracing::instrument(skip(state, req))]
pub async fn transition<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid(&id, "order id")?);

    let order = state
        .intake
        .transition_status(order_id, req.status, req.role)
        .await?;

    Ok(Json(TransitionResponse {
        id: order.id,
        status: order.status,
        updated_at: order.updated_at,
    }))
}

fn parse_uuid(s: &str, field: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}
