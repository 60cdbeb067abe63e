//! Pricing snapshot computation.
//!
//! Prices are read under the same row locks as stock (in the store
//! layer) and frozen into the order here. Both store implementations
//! share this logic, so the sufficiency re-check under lock behaves
//! identically in Postgres and in memory.

use std::collections::BTreeMap;

use common::ProductId;

use crate::error::PricingError;
use crate::money::Money;
use crate::request::RequestedItem;

/// A product's price and available stock as observed under lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockQuote {
    pub product_id: ProductId,
    pub unit_price: Money,
    pub available: i64,
}

/// A line item with its frozen unit price and subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// A fully priced order, ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

/// Prices normalized lines against the quotes taken under lock.
///
/// Fails on the first product without a quote, with insufficient
/// stock, or whose subtotal overflows the cents range; the caller
/// rolls the whole transaction back, so a partial result is never
/// observable.
pub fn price_order(
    lines: &[RequestedItem],
    quotes: &BTreeMap<ProductId, StockQuote>,
) -> Result<PricedOrder, PricingError> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut total = Money::zero();

    for line in lines {
        let quote = quotes
            .get(&line.product_id)
            .ok_or(PricingError::ProductMissing(line.product_id))?;

        if (line.quantity as i64) > quote.available {
            return Err(PricingError::InsufficientStock {
                product_id: line.product_id,
                requested: line.quantity,
                available: quote.available,
            });
        }

        let subtotal = quote
            .unit_price
            .checked_mul(line.quantity)
            .ok_or(PricingError::AmountOverflow {
                product_id: line.product_id,
            })?;
        total = total
            .checked_add(subtotal)
            .ok_or(PricingError::AmountOverflow {
                product_id: line.product_id,
            })?;
        priced.push(PricedLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: quote.unit_price,
            subtotal,
        });
    }

    Ok(PricedOrder {
        lines: priced,
        total,
    })
}
