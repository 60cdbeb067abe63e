use common::{OrderId, ProductId};
use domain::{PricingError, TransitionError, ValidationError};
use thiserror::Error;

/// Errors surfaced by order-intake store operations.
///
/// Business-rule failures (`Validation`, `ProductNotFound`,
/// `InsufficientStock`, `AmountOverflow`, `Transition`) are never
/// retried and always roll back cleanly; only store-level lock
/// contention is retried, and exhausting those retries surfaces
/// `Conflict`.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The request was malformed; rejected before any store access.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A status transition was rejected by the guard.
    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),

    /// A referenced product does not exist in the catalog.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Requested quantity exceeds the stock observed under lock.
    /// Not retryable: the caller must resubmit with adjusted
    /// quantities.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// The order amount overflowed the cents range during pricing.
    /// Not retryable.
    #[error("order amount overflow at product {product_id}")]
    AmountOverflow { product_id: ProductId },

    /// Lock contention persisted past the retry budget. Retryable by
    /// the caller.
    #[error("order placement conflicted after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<PricingError> for IntakeError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::ProductMissing(product_id) => IntakeError::ProductNotFound(product_id),
            PricingError::InsufficientStock {
                product_id,
                requested,
                available,
            } => IntakeError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            PricingError::AmountOverflow { product_id } => {
                IntakeError::AmountOverflow { product_id }
            }
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, IntakeError>;
