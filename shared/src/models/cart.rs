//! Cart record and item payloads
//!
//! A cart is the mutable pre-checkout basket. Items are keyed by product
//! id (no duplicates) and every quantity is at least 1; an item dropping
//! to zero quantity is removed, never stored as zero.

use crate::impl_versioned;
use crate::owner::Owner;
use crate::util;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One line in a cart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
}

/// Item payload accepted from callers
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CartItemInput {
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    #[validate(range(min = 1, max = 9999))]
    pub quantity: u32,
}

/// Mutable pre-checkout basket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub id: String,
    pub owner: Owner,
    pub items: Vec<CartItem>,
    /// Epoch milliseconds of the last mutation; drives expiry reclamation
    pub last_updated: i64,
    pub version: u64,
}

impl Cart {
    /// Create an empty cart for an owner, stamped now
    pub fn new(owner: Owner) -> Self {
        Self {
            id: util::new_id(),
            owner,
            items: Vec::new(),
            last_updated: util::now_ms(),
            version: 0,
        }
    }

    /// Find the line for a product, if present
    pub fn item(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Whether this cart has been idle longer than `threshold_ms` as of `now`
    pub fn is_expired(&self, now: i64, threshold_ms: i64) -> bool {
        now - self.last_updated > threshold_ms
    }
}

impl_versioned!(Cart);
