//! Stock ledger
//!
//! Owns the available-quantity counter on product records. Reservation
//! happens the moment an item enters a cart, not at order placement, so
//! checkout can never oversell. Both operations run inside the caller's
//! write transaction: a failure after some reservations in a multi-item
//! sequence aborts the transaction and releases nothing by hand.

use crate::common::error::{CoreError, CoreResult};
use crate::storage::Store;
use redb::WriteTransaction;
use shared::Product;

#[derive(Clone)]
pub struct StockLedger {
    store: Store,
}

impl StockLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Atomically decrement a product's stock by `qty`.
    ///
    /// Fails with `NotFound` when the product does not exist and with
    /// `InsufficientStock` when the decrement would go negative; in both
    /// cases the enclosing transaction must be abandoned, which rolls back
    /// every reservation already made in it.
    pub fn reserve(&self, txn: &WriteTransaction, product_id: &str, qty: u32) -> CoreResult<Product> {
        let Some(mut product) = self.store.get_product_for_update(txn, product_id)? else {
            return Err(CoreError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            });
        };

        let available = product.stock;
        product.stock -= i64::from(qty);
        if product.stock < 0 {
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: qty,
                available,
            });
        }

        self.store.put_product(txn, &mut product)?;
        tracing::debug!(product_id, qty, remaining = product.stock, "Stock reserved");
        Ok(product)
    }

    /// Atomically increment a product's stock by `qty`.
    ///
    /// Used to restore stock on cart removal, cart expiry and order
    /// cancellation. A product deleted in the meantime is logged and
    /// skipped; a vanished product cannot meaningfully hold reserved
    /// stock, and the release must not fail the surrounding reclamation.
    pub fn release(
        &self,
        txn: &WriteTransaction,
        product_id: &str,
        qty: u32,
    ) -> CoreResult<Option<Product>> {
        match self.store.get_product_for_update(txn, product_id)? {
            Some(mut product) => {
                product.stock += i64::from(qty);
                self.store.put_product(txn, &mut product)?;
                tracing::debug!(product_id, qty, available = product.stock, "Stock released");
                Ok(Some(product))
            }
            None => {
                tracing::warn!(product_id, qty, "Releasing stock for a missing product, skipping");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn setup() -> (Store, StockLedger) {
        let store = Store::open_in_memory().unwrap();
        let ledger = StockLedger::new(store.clone());
        let txn = store.begin_write().unwrap();
        store
            .insert_product(&txn, &Product::new("p1", "Widget", Decimal::TEN, 5))
            .unwrap();
        txn.commit().unwrap();
        (store, ledger)
    }

    fn stock_of(store: &Store, id: &str) -> i64 {
        let txn = store.begin_read().unwrap();
        store.get_product(&txn, id).unwrap().unwrap().stock
    }

    #[test]
    fn test_reserve_decrements_and_bumps_version() {
        let (store, ledger) = setup();

        let txn = store.begin_write().unwrap();
        let product = ledger.reserve(&txn, "p1", 3).unwrap();
        txn.commit().unwrap();

        assert_eq!(product.stock, 2);
        assert_eq!(product.version, 1);
        assert_eq!(stock_of(&store, "p1"), 2);
    }

    #[test]
    fn test_reserve_rejects_oversell_and_leaves_stock_unchanged() {
        let (store, ledger) = setup();

        let txn = store.begin_write().unwrap();
        let err = ledger.reserve(&txn, "p1", 6).unwrap_err();
        drop(txn);

        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            }
        ));
        assert_eq!(stock_of(&store, "p1"), 5);
    }

    #[test]
    fn test_reserve_to_exactly_zero_is_allowed() {
        let (store, ledger) = setup();

        let txn = store.begin_write().unwrap();
        ledger.reserve(&txn, "p1", 5).unwrap();
        txn.commit().unwrap();

        assert_eq!(stock_of(&store, "p1"), 0);
    }

    #[test]
    fn test_reserve_unknown_product() {
        let (store, ledger) = setup();
        let txn = store.begin_write().unwrap();
        let err = ledger.reserve(&txn, "ghost", 1).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_release_tolerates_missing_product() {
        let (store, ledger) = setup();

        let txn = store.begin_write().unwrap();
        assert!(ledger.release(&txn, "ghost", 2).unwrap().is_none());
        let restored = ledger.release(&txn, "p1", 2).unwrap().unwrap();
        assert_eq!(restored.stock, 7);
        txn.commit().unwrap();

        assert_eq!(stock_of(&store, "p1"), 7);
    }

    #[test]
    fn test_failed_multi_reserve_rolls_back_siblings() {
        let (store, ledger) = setup();
        let txn = store.begin_write().unwrap();
        store
            .insert_product(&txn, &Product::new("p2", "Gadget", Decimal::ONE, 1))
            .unwrap();
        txn.commit().unwrap();

        // First reservation succeeds, second oversells; dropping the txn
        // must undo both
        let txn = store.begin_write().unwrap();
        ledger.reserve(&txn, "p1", 2).unwrap();
        assert!(ledger.reserve(&txn, "p2", 5).is_err());
        drop(txn);

        assert_eq!(stock_of(&store, "p1"), 5);
        assert_eq!(stock_of(&store, "p2"), 1);
    }
}
