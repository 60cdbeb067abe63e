//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::status::{OrderStatus, Role};

/// Errors that reject an order request before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The request contained no line items.
    #[error("order must contain at least one line item")]
    Empty,

    /// A line item requested a quantity of zero.
    #[error("invalid quantity for product {product_id}: must be greater than 0")]
    ZeroQuantity { product_id: ProductId },

    /// Coalescing duplicate lines overflowed the quantity range.
    #[error("quantity overflow for product {product_id}")]
    QuantityOverflow { product_id: ProductId },
}

/// Errors produced by the status transition guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The requested edge is not in the allowed transition set.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The caller's role may not transition orders.
    #[error("role {role} may not transition order status")]
    Forbidden { role: Role },
}

/// Errors produced while pricing coalesced lines against locked stock
/// quotes. The store layer maps these onto its own taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// A requested product had no quote, i.e. it does not exist.
    #[error("no stock quote for product {0}")]
    ProductMissing(ProductId),

    /// Requested quantity exceeds the stock observed under lock.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// `price × quantity` (or the running total) overflowed the cents
    /// range.
    #[error("order amount overflow at product {product_id}")]
    AmountOverflow { product_id: ProductId },
}
