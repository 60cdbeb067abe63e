//! PostgreSQL-backed order store.
//!
//! This is the transaction coordinator: each placement runs as one
//! all-or-nothing transaction that locks the referenced product rows
//! in ascending id order, re-checks stock and snapshots prices under
//! those locks, persists the order with its line items, and decrements
//! the ledger. Read committed plus the explicit `FOR UPDATE` locks is
//! enough to prevent write skew on the stock counters.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{LineItemId, OrderId, ProductId, UserId};
use domain::{
    LineItem, Money, Order, OrderRequest, OrderStatus, OrderWithItems, RequestedItem, Role,
    StockQuote, authorize_transition, price_order,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::{IntakeError, Result};
use crate::retry::RetryPolicy;
use crate::store::OrderStore;

/// PostgreSQL order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store with the default retry
    /// policy.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// One placement attempt: a single transaction covering the locked
    /// reads, the inserts, and the ledger decrements. Any error drops
    /// the transaction uncommitted, so nothing is observably changed.
    async fn try_place(&self, user_id: UserId, lines: &[RequestedItem]) -> Result<OrderWithItems> {
        let mut tx = self.pool.begin().await?;

        // Bounded wait on contended rows; exceeding it surfaces as a
        // retryable conflict rather than a hang.
        let lock_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.retry.lock_timeout.as_millis()
        );
        sqlx::query(&lock_timeout).execute(&mut *tx).await?;

        let quotes = lock_and_fetch(&mut *tx, lines).await?;
        let priced = price_order(lines, &quotes).map_err(IntakeError::from)?;

        let now = Utc::now();
        let order = Order::create(OrderId::new(), user_id, priced.total, now);
        insert_order(&mut *tx, &order).await?;

        let mut items = Vec::with_capacity(priced.lines.len());
        for line in &priced.lines {
            let item = LineItem::from_priced(order.id, line, now);
            insert_line_item(&mut *tx, &item).await?;
            decrement_stock(&mut *tx, line.product_id, line.quantity, now).await?;
            items.push(item);
        }

        tx.commit().await?;
        Ok(OrderWithItems { order, items })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, request), fields(user_id = %user_id))]
    async fn place_order(
        &self,
        user_id: UserId,
        request: OrderRequest,
    ) -> Result<OrderWithItems> {
        // Fail fast on malformed input, before any store access.
        let lines = request.normalize()?;

        let start = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_place(user_id, &lines).await {
                Ok(placed) => {
                    metrics::counter!("orders_placed_total").increment(1);
                    metrics::histogram!("order_placement_seconds")
                        .record(start.elapsed().as_secs_f64());
                    tracing::info!(
                        order_id = %placed.order.id,
                        total = %placed.order.total,
                        attempt,
                        "order placed"
                    );
                    return Ok(placed);
                }
                Err(e) if is_retryable(&e) => {
                    metrics::counter!("order_lock_conflicts_total").increment(1);
                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(attempt, error = %e, "placement retries exhausted");
                        return Err(IntakeError::Conflict { attempts: attempt });
                    }
                    let backoff = self.retry.backoff(attempt);
                    tracing::debug!(attempt, backoff_ms = backoff.as_millis() as u64,
                        "lock conflict, retrying placement");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn transition_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        role: Role,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        // Lock the header so the guard and the update observe the same
        // status.
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(IntakeError::OrderNotFound(order_id))?;

        let order = row_to_order(&row)?;
        authorize_transition(order.status, target, role)?;

        let updated_at = Utc::now();
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(target.as_str())
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        metrics::counter!("order_status_transitions_total").increment(1);
        tracing::info!(from = %order.status, to = %target, "order status transitioned");

        Ok(Order {
            status: target,
            updated_at,
            ..order
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderWithItems>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = row_to_order(&row)?;

        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price_cents, created_at
            FROM order_items
            WHERE order_id = $1
            ORDER BY product_id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(row_to_item)
            .collect::<Result<Vec<LineItem>>>()?;

        Ok(Some(OrderWithItems { order, items }))
    }
}

/// Acquires exclusive locks on exactly the product rows named by
/// `lines`, in ascending id order, and returns their price and stock
/// as observed under the lock. Every caller locking in the same order
/// is what makes deadlocks between overlapping placements impossible.
async fn lock_and_fetch(
    conn: &mut PgConnection,
    lines: &[RequestedItem],
) -> Result<BTreeMap<ProductId, StockQuote>> {
    let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id.as_uuid()).collect();

    let rows = sqlx::query(
        r#"
        SELECT id, price_cents, stock
        FROM products
        WHERE id = ANY($1)
        ORDER BY id ASC
        FOR UPDATE
        "#,
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut quotes = BTreeMap::new();
    for row in rows {
        let product_id = ProductId::from_uuid(row.try_get::<Uuid, _>("id")?);
        quotes.insert(
            product_id,
            StockQuote {
                product_id,
                unit_price: Money::from_cents(row.try_get("price_cents")?),
                available: row.try_get("stock")?,
            },
        );
    }
    Ok(quotes)
}

async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, user_id, total_cents, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.user_id.as_uuid())
    .bind(order.total.cents())
    .bind(order.status.as_str())
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_line_item(conn: &mut PgConnection, item: &LineItem) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (id, order_id, product_id, quantity, price_cents, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(item.id.as_uuid())
    .bind(item.order_id.as_uuid())
    .bind(item.product_id.as_uuid())
    .bind(item.quantity as i64)
    .bind(item.unit_price.cents())
    .bind(item.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Applies a stock decrement. Valid only while the caller holds the
/// row lock from `lock_and_fetch` in the same transaction, after the
/// sufficiency re-check.
async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - $2, updated_at = $3
        WHERE id = $1
        "#,
    )
    .bind(product_id.as_uuid())
    .bind(quantity as i64)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(IntakeError::ProductNotFound(product_id));
    }
    Ok(())
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: parse_status(row.try_get("status")?)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<LineItem> {
    let quantity: i64 = row.try_get("quantity")?;
    Ok(LineItem {
        id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: u32::try_from(quantity)
            .map_err(|e| IntakeError::Database(sqlx::Error::Decode(Box::new(e))))?,
        unit_price: Money::from_cents(row.try_get("price_cents")?),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn parse_status(s: &str) -> Result<OrderStatus> {
    s.parse::<OrderStatus>()
        .map_err(|e| IntakeError::Database(sqlx::Error::Decode(Box::new(e))))
}

/// Lock-wait timeout (55P03), serialization failure (40001), and
/// deadlock (40P01) are transient contention; everything else is
/// terminal.
fn is_retryable(err: &IntakeError) -> bool {
    match err {
        IntakeError::Database(sqlx::Error::Database(db)) => {
            matches!(db.code().as_deref(), Some("40001" | "40P01" | "55P03"))
        }
        _ => false,
    }
}
