//! Order request validation and coalescing.

use std::collections::BTreeMap;

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A single requested line: a product and a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl RequestedItem {
    /// Creates a new requested item.
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A caller-supplied order request. Transient: it is validated and
/// coalesced, never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub items: Vec<RequestedItem>,
}

impl OrderRequest {
    /// Creates an order request from a list of items.
    pub fn new(items: Vec<RequestedItem>) -> Self {
        Self { items }
    }

    /// Validates the request and returns the normalized line list.
    ///
    /// Duplicate product ids are coalesced into a single line with the
    /// summed quantity. The result is sorted by ascending product id,
    /// which is also the order in which the inventory ledger acquires
    /// row locks.
    pub fn normalize(&self) -> Result<Vec<RequestedItem>, ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::Empty);
        }

        let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
        for item in &self.items {
            if item.quantity == 0 {
                return Err(ValidationError::ZeroQuantity {
                    product_id: item.product_id,
                });
            }
            let slot = merged.entry(item.product_id).or_insert(0);
            *slot = slot
                .checked_add(item.quantity)
                .ok_or(ValidationError::QuantityOverflow {
                    product_id: item.product_id,
                })?;
        }

        Ok(merged
            .into_iter()
            .map(|(product_id, quantity)| RequestedItem {
                product_id,
                quantity,
            })
            .collect())
    }
}
