//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use orders::OrderServiceError;

use crate::identity::IdentityError;

/// API-level error type that maps to HTTP responses.
///
/// Every response body has the shape `{"error": "...", "code": "..."}`.
/// Backend details are logged, never returned.
#[derive(Debug)]
pub enum ApiError {
    /// The request could not be decoded.
    BadRequest(String),
    /// Missing or invalid bearer token.
    Unauthorized(IdentityError),
    /// Authenticated, but not allowed.
    Forbidden(String),
    /// Order component error.
    Orders(OrderServiceError),
    /// Inventory component error.
    Inventory(InventoryError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "validation_failed", msg.clone())
            }
            ApiError::Unauthorized(err) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", err.to_string())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Orders(err) => order_error_parts(err),
            ApiError::Inventory(err) => inventory_error_parts(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = ?self, code, "request failed");
        }

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_parts(err: &OrderServiceError) -> (StatusCode, &'static str, String) {
    let code = err.reason_code();
    let status = match err {
        OrderServiceError::Validation(_) | OrderServiceError::InsufficientStock { .. } => {
            StatusCode::BAD_REQUEST
        }
        OrderServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        OrderServiceError::OrderNotFound(_) | OrderServiceError::StockNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        OrderServiceError::ReservationInProgress
        | OrderServiceError::OrderBusy(_)
        | OrderServiceError::AlreadyCancelled(_)
        | OrderServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
        OrderServiceError::Unavailable(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                code,
                "upstream service unavailable".to_string(),
            );
        }
        OrderServiceError::Internal(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                code,
                "internal error".to_string(),
            );
        }
    };
    (status, code, err.to_string())
}

fn inventory_error_parts(err: &InventoryError) -> (StatusCode, &'static str, String) {
    match err {
        InventoryError::Validation(_) => {
            (StatusCode::BAD_REQUEST, "validation_failed", err.to_string())
        }
        InventoryError::NotFound(_) => (StatusCode::NOT_FOUND, "stock_not_found", err.to_string()),
        InventoryError::AlreadyExists(_) => {
            (StatusCode::CONFLICT, "stock_already_exists", err.to_string())
        }
        InventoryError::InsufficientStock { .. } => {
            (StatusCode::BAD_REQUEST, "insufficient_stock", err.to_string())
        }
        InventoryError::Unavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream_unavailable",
            "upstream service unavailable".to_string(),
        ),
        InventoryError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal error".to_string(),
        ),
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(err: OrderServiceError) -> Self {
        ApiError::Orders(err)
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::Unauthorized(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, ProductId};
    use store::StoreError;

    #[test]
    fn order_errors_map_to_status_and_code() {
        let cases = [
            (
                OrderServiceError::ReservationInProgress,
                StatusCode::CONFLICT,
                "reservation_in_progress",
            ),
            (
                OrderServiceError::AlreadyCancelled(OrderId::new()),
                StatusCode::CONFLICT,
                "order_already_cancelled",
            ),
            (
                OrderServiceError::StockNotFound(ProductId::new(1)),
                StatusCode::NOT_FOUND,
                "stock_not_found",
            ),
            (
                OrderServiceError::InsufficientStock {
                    product_id: ProductId::new(1),
                    available: 2,
                    requested: 3,
                },
                StatusCode::BAD_REQUEST,
                "insufficient_stock",
            ),
        ];

        for (err, status, code) in cases {
            let (s, c, _) = ApiError::from(err).parts();
            assert_eq!((s, c), (status, code));
        }
    }

    #[test]
    fn backend_details_are_not_exposed() {
        let err = ApiError::from(InventoryError::Store(StoreError::Corrupt(
            "row 42 has status ???".into(),
        )));
        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "internal_error");
        assert!(!message.contains("row 42"));

        let err = ApiError::from(OrderServiceError::Unavailable(
            "connection refused 10.0.0.3:5432".into(),
        ));
        let (status, _, message) = err.parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!message.contains("10.0.0.3"));
    }
}
