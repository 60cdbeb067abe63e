use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Order, OrderRequest, OrderStatus, OrderWithItems, Role};

use crate::error::Result;

/// Core trait for order-intake store implementations.
///
/// All implementations must be thread-safe (`Send + Sync`) and must
/// uphold the same guarantees: a placement either commits the order
/// header, its line items, and the stock decrements together, or
/// leaves no observable change at all.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Converts a requested line-item list into a durable, priced
    /// order for `user_id`.
    ///
    /// The request is validated and coalesced first; the referenced
    /// product rows are then locked in ascending id order, stock is
    /// re-checked under lock, prices are snapshotted under the same
    /// lock, and the order is persisted together with the stock
    /// decrements. The committed sales quantity for a product can
    /// therefore never exceed its available stock, regardless of
    /// concurrency.
    async fn place_order(&self, user_id: UserId, request: OrderRequest)
    -> Result<OrderWithItems>;

    /// Moves an order to `target` status, enforcing the legal state
    /// machine and the caller's role. Updates `updated_at` as a single
    /// atomic row update and returns the updated header.
    async fn transition_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        role: Role,
    ) -> Result<Order>;

    /// Loads an order and its line items, or `None` if it does not
    /// exist.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderWithItems>>;
}
