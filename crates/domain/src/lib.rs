//! Domain layer for the order-intake system.
//!
//! This crate holds the pure business logic, with no I/O:
//! - Order request validation and coalescing
//! - Pricing snapshot computation against locked stock quotes
//! - Order status state machine and transition guard
//! - Persisted shapes for orders and their line items

pub mod error;
pub mod money;
pub mod order;
pub mod pricing;
pub mod request;
pub mod status;

pub use error::{PricingError, TransitionError, ValidationError};
pub use money::Money;
pub use order::{LineItem, Order, OrderWithItems};
pub use pricing::{PricedLine, PricedOrder, StockQuote, price_order};
pub use request::{OrderRequest, RequestedItem};
pub use status::{OrderStatus, ParseStatusError, Role, authorize_transition};
