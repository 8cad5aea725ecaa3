//! Order record and status state machine
//!
//! Orders are immutable once created except for `status` (and `version`).
//! The item list is a snapshot of the cart at checkout, priced with the
//! product prices current at that moment.

use crate::impl_versioned;
use crate::util;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Order lifecycle status
///
/// ```text
/// pending ──► processing ──► shipped ──► delivered
///    │             │            │
///    └─────────────┴────────────┴──► cancelled
/// ```
///
/// `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether no further transition is allowed out of this status
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether the state machine allows `self -> next`
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Processing) | (Processing, Shipped) | (Shipped, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// One order line, snapshotted from the cart at checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    /// Product price at checkout time
    pub unit_price: Decimal,
}

/// Immutable-once-created order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub items: Vec<OrderLine>,
    /// Payable total: line totals + shipping fee - applied credit
    pub amount: Decimal,
    /// Store credit consumed at checkout
    pub credit_applied: Decimal,
    /// Flat shipping fee snapshot
    pub shipping_fee: Decimal,
    pub address: String,
    pub status: OrderStatus,
    pub created_at: i64,
    pub version: u64,
}

impl Order {
    pub fn new(
        user_id: impl Into<String>,
        items: Vec<OrderLine>,
        amount: Decimal,
        credit_applied: Decimal,
        shipping_fee: Decimal,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: util::new_id(),
            user_id: user_id.into(),
            items,
            amount,
            credit_applied,
            shipping_fee,
            address: address.into(),
            status: OrderStatus::Pending,
            created_at: util::now_ms(),
            version: 0,
        }
    }
}

impl_versioned!(Order);

/// Checkout payload accepted from callers
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, max = 500))]
    pub address: String,
}
