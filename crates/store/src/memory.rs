//! In-memory order store for tests and local development.
//!
//! A single `RwLock` over the whole state stands in for the row locks
//! the PostgreSQL store takes: every placement holds the write lock
//! from the stock check through the decrement, so the same
//! no-oversell and all-or-nothing guarantees hold.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use domain::{
    LineItem, Money, Order, OrderRequest, OrderStatus, OrderWithItems, Role, StockQuote,
    authorize_transition, price_order,
};
use tokio::sync::RwLock;

use crate::error::{IntakeError, Result};
use crate::store::OrderStore;

#[derive(Debug, Clone)]
struct ProductRecord {
    unit_price: Money,
    stock: i64,
}

#[derive(Debug, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, ProductRecord>,
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<LineItem>>,
}

/// In-memory order store implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product, returning its generated id.
    pub async fn insert_product(&self, unit_price: Money, stock: i64) -> ProductId {
        let product_id = ProductId::new();
        let mut state = self.state.write().await;
        state
            .products
            .insert(product_id, ProductRecord { unit_price, stock });
        product_id
    }

    /// Changes a product's price. Orders already placed keep the price
    /// they were priced at.
    pub async fn set_price(&self, product_id: ProductId, unit_price: Money) {
        let mut state = self.state.write().await;
        if let Some(record) = state.products.get_mut(&product_id) {
            record.unit_price = unit_price;
        }
    }

    /// Current stock level, if the product exists.
    pub async fn stock_of(&self, product_id: ProductId) -> Option<i64> {
        let state = self.state.read().await;
        state.products.get(&product_id).map(|r| r.stock)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    #[tracing::instrument(skip(self, request), fields(user_id = %user_id))]
    async fn place_order(
        &self,
        user_id: UserId,
        request: OrderRequest,
    ) -> Result<OrderWithItems> {
        let lines = request.normalize()?;

        // Write lock held across check and decrement: placements are
        // serialized, so no interleaving can oversell.
        let mut state = self.state.write().await;

        let mut quotes = BTreeMap::new();
        for line in &lines {
            if let Some(record) = state.products.get(&line.product_id) {
                quotes.insert(
                    line.product_id,
                    StockQuote {
                        product_id: line.product_id,
                        unit_price: record.unit_price,
                        available: record.stock,
                    },
                );
            }
        }
        let priced = price_order(&lines, &quotes).map_err(IntakeError::from)?;

        let now = Utc::now();
        let order = Order::create(OrderId::new(), user_id, priced.total, now);
        let items: Vec<LineItem> = priced
            .lines
            .iter()
            .map(|line| LineItem::from_priced(order.id, line, now))
            .collect();

        for line in &priced.lines {
            if let Some(record) = state.products.get_mut(&line.product_id) {
                record.stock -= i64::from(line.quantity);
            }
        }
        state.orders.insert(order.id, order.clone());
        state.items.insert(order.id, items.clone());

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id, total = %order.total, "order placed");

        Ok(OrderWithItems { order, items })
    }

    #[tracing::instrument(skip(self))]
    async fn transition_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        role: Role,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(IntakeError::OrderNotFound(order_id))?;

        authorize_transition(order.status, target, role)?;

        order.status = target;
        order.updated_at = Utc::now();

        metrics::counter!("order_status_transitions_total").increment(1);
        Ok(order.clone())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderWithItems>> {
        let state = self.state.read().await;
        let Some(order) = state.orders.get(&order_id) else {
            return Ok(None);
        };
        let items = state.items.get(&order_id).cloned().unwrap_or_default();
        Ok(Some(OrderWithItems {
            order: order.clone(),
            items,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::RequestedItem;

    fn request(items: Vec<(ProductId, u32)>) -> OrderRequest {
        OrderRequest {
            items: items
                .into_iter()
                .map(|(product_id, quantity)| RequestedItem {
                    product_id,
                    quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_place_order_decrements_stock_and_totals() {
        let store = InMemoryOrderStore::new();
        let coffee = store.insert_product(Money::from_cents(450), 10).await;
        let beans = store.insert_product(Money::from_cents(1200), 5).await;

        let placed = store
            .place_order(UserId::new(), request(vec![(coffee, 2), (beans, 1)]))
            .await
            .unwrap();

        assert_eq!(placed.order.status, OrderStatus::Pending);
        assert_eq!(placed.order.total, Money::from_cents(2 * 450 + 1200));
        assert_eq!(placed.items.len(), 2);
        assert_eq!(store.stock_of(coffee).await, Some(8));
        assert_eq!(store.stock_of(beans).await, Some(4));
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_coalesced() {
        let store = InMemoryOrderStore::new();
        let coffee = store.insert_product(Money::from_cents(450), 10).await;

        let placed = store
            .place_order(UserId::new(), request(vec![(coffee, 2), (coffee, 3)]))
            .await
            .unwrap();

        assert_eq!(placed.items.len(), 1);
        assert_eq!(placed.items[0].quantity, 5);
        assert_eq!(store.stock_of(coffee).await, Some(5));
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let store = InMemoryOrderStore::new();
        let coffee = store.insert_product(Money::from_cents(450), 10).await;
        let beans = store.insert_product(Money::from_cents(1200), 1).await;

        let err = store
            .place_order(UserId::new(), request(vec![(coffee, 2), (beans, 3)]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IntakeError::InsufficientStock {
                product_id,
                requested: 3,
                available: 1,
            } if product_id == beans
        ));
        // The coffee line must not have been applied either.
        assert_eq!(store.stock_of(coffee).await, Some(10));
        assert_eq!(store.stock_of(beans).await, Some(1));
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let store = InMemoryOrderStore::new();
        let ghost = ProductId::new();

        let err = store
            .place_order(UserId::new(), request(vec![(ghost, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::ProductNotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn test_price_change_does_not_reprice_existing_order() {
        let store = InMemoryOrderStore::new();
        let coffee = store.insert_product(Money::from_cents(450), 10).await;

        let placed = store
            .place_order(UserId::new(), request(vec![(coffee, 2)]))
            .await
            .unwrap();
        store.set_price(coffee, Money::from_cents(9900)).await;

        let fetched = store.get_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(fetched.order.total, Money::from_cents(900));
        assert_eq!(fetched.items[0].unit_price, Money::from_cents(450));
    }

    #[tokio::test]
    async fn test_concurrent_placements_never_oversell() {
        let store = InMemoryOrderStore::new();
        let coffee = store.insert_product(Money::from_cents(450), 5).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .place_order(UserId::new(), request(vec![(coffee, 3)]))
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        // Stock 5 admits exactly one order of 3.
        assert_eq!(successes, 1);
        assert_eq!(store.stock_of(coffee).await, Some(2));
    }

    #[tokio::test]
    async fn test_admin_transitions_walk_the_lifecycle() {
        let store = InMemoryOrderStore::new();
        let coffee = store.insert_product(Money::from_cents(450), 10).await;
        let placed = store
            .place_order(UserId::new(), request(vec![(coffee, 1)]))
            .await
            .unwrap();

        for target in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let updated = store
                .transition_status(placed.order.id, target, Role::Admin)
                .await
                .unwrap();
            assert_eq!(updated.status, target);
        }

        let err = store
            .transition_status(placed.order.id, OrderStatus::Cancelled, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Transition(_)));
    }

    #[tokio::test]
    async fn test_customer_cannot_transition() {
        let store = InMemoryOrderStore::new();
        let coffee = store.insert_product(Money::from_cents(450), 10).await;
        let placed = store
            .place_order(UserId::new(), request(vec![(coffee, 1)]))
            .await
            .unwrap();

        let err = store
            .transition_status(placed.order.id, OrderStatus::Processing, Role::Customer)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Transition(domain::TransitionError::Forbidden {
                role: Role::Customer
            })
        ));
    }

    #[tokio::test]
    async fn test_transition_unknown_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        let order_id = OrderId::new();
        let err = store
            .transition_status(order_id, OrderStatus::Processing, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::OrderNotFound(id) if id == order_id));
    }

    #[tokio::test]
    async fn test_get_unknown_order_is_none() {
        let store = InMemoryOrderStore::new();
        assert!(store.get_order(OrderId::new()).await.unwrap().is_none());
    }
}
