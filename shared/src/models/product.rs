//! Product record
//!
//! Owned by the catalog; the fulfillment core only ever mutates `stock`
//! (and `version`) through the stock ledger.

use crate::impl_versioned;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog product with its available quantity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Unit price, non-negative
    pub price: Decimal,
    /// Available quantity; never goes below zero
    pub stock: i64,
    pub version: u64,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal, stock: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            version: 0,
        }
    }
}

impl_versioned!(Product);
