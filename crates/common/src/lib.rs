mod types;

pub use types::{LineItemId, OrderId, ProductId, UserId};
