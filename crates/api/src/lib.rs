//! HTTP API server for the order reservation service.
//!
//! Binds the order and inventory components to REST endpoints, verifies
//! bearer tokens, and exposes structured logs (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use inventory::InventoryService;
use lock::{InMemoryLockManager, LockManager};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::{OrderService, ReservationConfig};
use store::{InMemoryOrderRepository, InMemoryStockLedger, OrderRepository, StockLedger};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use identity::{IdentityVerifier, JwtIdentityVerifier};

/// Order service over whichever backends the process was started with.
pub type AppOrderService =
    OrderService<Arc<dyn OrderRepository>, Arc<dyn StockLedger>, Arc<dyn LockManager>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: AppOrderService,
    pub identity: Arc<dyn IdentityVerifier>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/orders/{id}/confirm", post(routes::orders::confirm))
        .route("/inventory", post(routes::inventory::create))
        .route("/inventory/batch", post(routes::inventory::batch))
        .route("/inventory/{product_id}", get(routes::inventory::get))
        .route(
            "/inventory/{product_id}/adjust",
            post(routes::inventory::adjust),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over the given backends.
pub fn create_state(
    orders: Arc<dyn OrderRepository>,
    ledger: Arc<dyn StockLedger>,
    locks: Arc<dyn LockManager>,
    config: &Config,
) -> Arc<AppState> {
    let service = OrderService::with_config(
        orders,
        InventoryService::new(ledger),
        locks,
        ReservationConfig {
            lock_ttl: config.lock_ttl,
        },
    );

    Arc::new(AppState {
        orders: service,
        identity: Arc::new(JwtIdentityVerifier::new(&config.jwt_secret)),
    })
}

/// Creates application state with in-memory stores and locks.
pub fn create_default_state(config: &Config) -> Arc<AppState> {
    create_state(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(InMemoryStockLedger::new()),
        Arc::new(InMemoryLockManager::new()),
        config,
    )
}
