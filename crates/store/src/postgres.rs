use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId};
use domain::{Order, OrderItem, OrderStatus, StockRecord};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{OrderRepository, StockLedger},
};

/// Opens a connection pool to PostgreSQL.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs the embedded database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL-backed stock ledger.
#[derive(Clone)]
pub struct PostgresStockLedger {
    pool: PgPool,
}

impl PostgresStockLedger {
    /// Creates a new PostgreSQL stock ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_record(row: PgRow) -> Result<StockRecord> {
        Ok(StockRecord {
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get("quantity")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

#[async_trait]
impl StockLedger for PostgresStockLedger {
    async fn get(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        let row = sqlx::query(
            "SELECT product_id, quantity, updated_at FROM stock_records WHERE product_id = $1",
        )
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn insert(&self, product_id: ProductId, quantity: i64) -> Result<StockRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO stock_records (product_id, quantity)
            VALUES ($1, $2)
            ON CONFLICT (product_id) DO NOTHING
            RETURNING product_id, quantity, updated_at
            "#,
        )
        .bind(product_id.as_i64())
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_record(row),
            None => Err(StoreError::DuplicateStock(product_id)),
        }
    }

    async fn adjust(&self, product_id: ProductId, delta: i64) -> Result<i64> {
        // The guard and the write are one statement, so no other adjust
        // can interleave between them. The guard sums in NUMERIC so a
        // result past BIGINT is refused instead of raising an error.
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock_records
            SET quantity = quantity + $2, updated_at = NOW()
            WHERE product_id = $1
              AND quantity::NUMERIC + $2::BIGINT BETWEEN 0 AND 9223372036854775807
            RETURNING quantity
            "#,
        )
        .bind(product_id.as_i64())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(quantity) = updated {
            return Ok(quantity);
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM stock_records WHERE product_id = $1")
                .bind(product_id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        match available {
            Some(available) => {
                if available.checked_add(delta).is_none() {
                    tracing::debug!(%product_id, available, delta, "Stock adjustment overflows");
                }
                Err(StoreError::InsufficientStock {
                    product_id,
                    available,
                    delta,
                })
            }
            None => Err(StoreError::StockNotFound(product_id)),
        }
    }
}

/// PostgreSQL-backed order repository.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new PostgreSQL order repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        let quantity: i32 = row.try_get("quantity")?;
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: u32::try_from(quantity)
                .map_err(|_| StoreError::Corrupt(format!("negative item quantity {quantity}")))?,
        })
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order::from_parts(
            OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            row.try_get("owner")?,
            status.parse::<OrderStatus>()?,
            items,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }

    /// Loads the items of several orders, grouped by order id.
    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = Self::row_to_item(row)?;
            grouped.entry(item.order_id.as_uuid()).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn assemble(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<_, _>>()?;
        let mut items = self.load_items(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_order(row, items.remove(&id).unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, owner, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.owner())
        .bind(order.status().as_str())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::DuplicateOrder(order.id());
            }
            StoreError::Database(e)
        })?;

        for (position, item) in order.items().iter().enumerate() {
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| StoreError::Corrupt(format!("item quantity {} too large", item.quantity)))?;
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Corrupt("too many order items".to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, position, product_id, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id().as_uuid())
            .bind(position)
            .bind(item.product_id.as_i64())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, owner, status, created_at, updated_at FROM orders WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, status, created_at, updated_at
            FROM orders
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, status, created_at, updated_at
            FROM orders
            WHERE LOWER(owner) = LOWER($1)
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }

    async fn update_status(&self, order: &Order, expected: OrderStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.updated_at())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let actual: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order.id().as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match actual {
            Some(actual) => Err(StoreError::StatusConflict {
                order_id: order.id(),
                expected,
                actual: actual.parse()?,
            }),
            None => Err(StoreError::OrderNotFound(order.id())),
        }
    }
}
