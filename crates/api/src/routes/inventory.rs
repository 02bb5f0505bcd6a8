//! Stock endpoints. Reads are public; writes need an admin token.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use inventory::{BatchAdjustReport, StockChange};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::AuthPrincipal;

#[derive(Deserialize)]
pub struct CreateStockRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct AdjustStockRequest {
    pub change: i64,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct BatchAdjustRequest {
    pub items: Vec<BatchItemRequest>,
}

#[derive(Deserialize)]
pub struct BatchItemRequest {
    pub product_id: i64,
    pub change: i64,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: ProductId,
    pub quantity: i64,
}

fn decode<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn product_path(path: Result<Path<i64>, PathRejection>) -> Result<ProductId, ApiError> {
    path.map(|Path(id)| ProductId::new(id))
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// GET /inventory/{product_id}
#[tracing::instrument(skip_all)]
pub async fn get(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = product_path(path)?;
    let quantity = state.orders.inventory().check_stock(product_id).await?;
    Ok(Json(StockResponse {
        product_id,
        quantity,
    }))
}

/// POST /inventory: register stock for a new product.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    payload: Result<Json<CreateStockRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StockResponse>), ApiError> {
    principal.require_admin()?;
    let req = decode(payload)?;

    let record = state
        .orders
        .inventory()
        .create_stock(ProductId::new(req.product_id), req.quantity)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StockResponse {
            product_id: record.product_id,
            quantity: record.quantity,
        }),
    ))
}

/// POST /inventory/{product_id}/adjust: manual restock or write-off.
#[tracing::instrument(skip_all)]
pub async fn adjust(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AdjustStockRequest>, JsonRejection>,
) -> Result<Json<StockResponse>, ApiError> {
    let admin = principal.require_admin()?;
    let product_id = product_path(path)?;
    let req = decode(payload)?;

    tracing::info!(admin = %admin.email, %product_id, change = req.change, "Manual stock adjustment");
    let quantity = state
        .orders
        .inventory()
        .adjust_stock(product_id, req.change, req.reason.as_deref())
        .await?;

    Ok(Json(StockResponse {
        product_id,
        quantity,
    }))
}

/// POST /inventory/batch: independent per-item adjustments.
#[tracing::instrument(skip_all)]
pub async fn batch(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    payload: Result<Json<BatchAdjustRequest>, JsonRejection>,
) -> Result<Json<BatchAdjustReport>, ApiError> {
    principal.require_admin()?;
    let req = decode(payload)?;
    if req.items.is_empty() {
        return Err(ApiError::BadRequest("items must not be empty".to_string()));
    }

    let changes: Vec<StockChange> = req
        .items
        .iter()
        .map(|item| StockChange::new(item.product_id, item.change))
        .collect();
    let report = state.orders.inventory().batch_adjust_stock(&changes).await;
    Ok(Json(report))
}
