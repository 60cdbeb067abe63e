//! Transactional order store.
//!
//! This crate owns everything that touches durable state: the
//! `OrderStore` trait, the Postgres implementation (transaction
//! coordinator, inventory ledger access, and order persistence), an
//! in-memory implementation for tests and DB-less operation, and the
//! retry policy for lock conflicts.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod retry;
pub mod store;

pub use error::{IntakeError, Result};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use retry::RetryPolicy;
pub use store::OrderStore;
