//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use lock::{InMemoryLockManager, LockManager, RedisLockManager};
use store::{
    InMemoryOrderRepository, InMemoryStockLedger, OrderRepository, PostgresOrderRepository,
    PostgresStockLedger, StockLedger,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Open storage: PostgreSQL when configured, in-memory otherwise
    let pool = match &config.database_url {
        Some(url) => {
            let pool = store::connect(url, config.database_max_connections)
                .await
                .expect("failed to connect to PostgreSQL");
            store::run_migrations(&pool)
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL storage");
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            None
        }
    };
    let (orders, ledger): (Arc<dyn OrderRepository>, Arc<dyn StockLedger>) = match &pool {
        Some(pool) => (
            Arc::new(PostgresOrderRepository::new(pool.clone())),
            Arc::new(PostgresStockLedger::new(pool.clone())),
        ),
        None => (
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(InMemoryStockLedger::new()),
        ),
    };

    // 4. Lock manager: Redis when configured, in-process otherwise
    let locks: Arc<dyn LockManager> = match &config.redis_url {
        Some(url) => {
            let manager = RedisLockManager::connect(url)
                .await
                .expect("failed to connect to Redis");
            tracing::info!("using Redis lock manager");
            Arc::new(manager)
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process locks");
            Arc::new(InMemoryLockManager::new())
        }
    };

    // 5. Build the application
    let state = api::create_state(orders, ledger, locks, &config);
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, lock_ttl_ms = config.lock_ttl.as_millis() as u64, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Release storage handles
    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("server shut down gracefully");
}
