//! Cross-component flow tests: checkout, cancellation, contention and
//! reclamation against a real in-memory database.

use crate::core::{AppState, Config};
use rust_decimal::Decimal;
use shared::{util, Product};

mod test_concurrency;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn test_config() -> Config {
    Config {
        db_path: ":memory:".into(),
        cart_expiry_minutes: 30,
        reaper_interval_secs: 600,
        shipping_fee: dec("2.00"),
        credit_validity_days: 90,
        max_cart_items: 50,
        log_level: "info".into(),
    }
}

fn test_state() -> AppState {
    AppState::in_memory(test_config()).unwrap()
}

fn seed_product(state: &AppState, id: &str, name: &str, price: &str, stock: i64) {
    let txn = state.store.begin_write().unwrap();
    state
        .store
        .insert_product(&txn, &Product::new(id, name, dec(price), stock))
        .unwrap();
    txn.commit().unwrap();
}

fn stock_of(state: &AppState, id: &str) -> i64 {
    let txn = state.store.begin_read().unwrap();
    state.store.get_product(&txn, id).unwrap().unwrap().stock
}

/// Rewrite a cart's last-touched timestamp so it reads as idle for
/// `idle_ms` already
fn age_cart(state: &AppState, cart_id: &str, idle_ms: i64) {
    let txn = state.store.begin_write().unwrap();
    let mut cart = state
        .store
        .get_cart_for_update(&txn, cart_id)
        .unwrap()
        .unwrap();
    cart.last_updated = util::now_ms() - idle_ms;
    state.store.put_cart(&txn, &mut cart).unwrap();
    txn.commit().unwrap();
}
