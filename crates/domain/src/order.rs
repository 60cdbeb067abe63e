//! Persisted order shapes.
//!
//! An order header and its line items are created together, atomically,
//! inside the store's transaction, or not at all. After creation the
//! only permitted mutation is a guarded status transition; the total
//! and the line-item price snapshots are never recomputed.

use chrono::{DateTime, Utc};
use common::{LineItemId, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::pricing::PricedLine;
use crate::status::OrderStatus;

/// A durable order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Sum of line subtotals, frozen at creation.
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order header in the initial `Pending` status.
    pub fn create(id: OrderId, user_id: UserId, total: Money, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            total,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A line item belonging to exactly one order, immutable after
/// creation. `unit_price` is the snapshot taken at order time and is
/// independent of later product price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    /// Materialises a priced line as a persistable item of `order_id`.
    pub fn from_priced(order_id: OrderId, line: &PricedLine, now: DateTime<Utc>) -> Self {
        Self {
            id: LineItemId::new(),
            order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            created_at: now,
        }
    }

    /// Returns this line's subtotal (`unit_price × quantity`).
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order header together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<LineItem>,
}
