//! Store credit record
//!
//! One record per user. The balance grows on order cancellation and
//! shrinks when applied to a new order; the expiry date is cleared when
//! the balance reaches zero. Topping up an existing balance replaces the
//! expiry date rather than extending it (business rule, not a bug).

use crate::impl_versioned;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-user refundable balance with an expiry date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreCredit {
    pub user_id: String,
    /// Remaining balance, never negative
    pub amount: Decimal,
    /// Epoch milliseconds; `None` means no active credit
    pub expiry_date: Option<i64>,
    pub version: u64,
}

impl StoreCredit {
    pub fn new(user_id: impl Into<String>, amount: Decimal, expiry_date: i64) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            expiry_date: Some(expiry_date),
            version: 0,
        }
    }

    /// Whether this credit can be applied at `now`
    pub fn is_active(&self, now: i64) -> bool {
        self.amount > Decimal::ZERO && self.expiry_date.is_some_and(|exp| exp > now)
    }
}

impl_versioned!(StoreCredit);
