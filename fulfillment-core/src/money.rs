//! Money arithmetic
//!
//! All monetary math runs on `Decimal`; amounts are rounded to 2 decimal
//! places, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

const DECIMAL_PLACES: u32 = 2;

/// Round a monetary amount to cents
pub fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Line total for a quantity at a unit price
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    round(unit_price * Decimal::from(quantity))
}
