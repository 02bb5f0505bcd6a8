//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId};
use domain::{NewOrderItem, Order, OrderStatus};
use orders::CancelReport;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::{AuthPrincipal, MaybePrincipal};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    /// Guest email; ignored when a bearer token is supplied.
    pub email: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub owner: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            owner: order.owner().to_string(),
            status: order.status(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

fn parse_order_id(path: Result<Path<String>, PathRejection>) -> Result<OrderId, ApiError> {
    let Path(raw) = path.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid order id: {raw}")))
}

// -- Handlers --

/// POST /orders: place an order for the caller or a guest.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let items: Vec<NewOrderItem> = req
        .items
        .iter()
        .map(|item| NewOrderItem::new(item.product_id, item.quantity))
        .collect();

    let order = state
        .orders
        .create_order(principal.as_ref(), req.email.as_deref(), &items)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order_id: order.id(),
            status: order.status(),
        }),
    ))
}

/// GET /orders: the caller's orders, or every order for an admin.
#[tracing::instrument(skip_all)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(&principal).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip_all)]
pub async fn get(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(path)?;
    let order = state.orders.get_order(order_id, &principal).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel: cancel and return the items to stock.
#[tracing::instrument(skip_all)]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<CancelReport>, ApiError> {
    let order_id = parse_order_id(path)?;
    let report = state.orders.cancel_order(order_id, &principal).await?;
    Ok(Json(report))
}

/// POST /orders/{id}/confirm: admin only.
#[tracing::instrument(skip_all)]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(path)?;
    let order = state.orders.confirm_order(order_id, &principal).await?;
    Ok(Json(OrderResponse::from(&order)))
}
