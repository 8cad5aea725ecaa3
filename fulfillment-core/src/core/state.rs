//! Shared application state
//!
//! Wires the storage layer and the domain components together. Cheap to
//! clone; every component holds the same `Store` handle underneath.

use crate::cart::CartStore;
use crate::common::error::CoreResult;
use crate::core::config::Config;
use crate::credit::CreditLedger;
use crate::orders::OrderLedger;
use crate::reaper::CartReaper;
use crate::stock::StockLedger;
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub stock: StockLedger,
    pub credit: CreditLedger,
    pub carts: CartStore,
    pub orders: OrderLedger,
}

impl AppState {
    pub fn new(config: Config) -> CoreResult<Self> {
        let store = Store::open(&config.db_path)?;
        Ok(Self::assemble(config, store))
    }

    /// In-memory variant for tests and local experiments
    pub fn in_memory(config: Config) -> CoreResult<Self> {
        let store = Store::open_in_memory()?;
        Ok(Self::assemble(config, store))
    }

    fn assemble(config: Config, store: Store) -> Self {
        let stock = StockLedger::new(store.clone());
        let credit = CreditLedger::new(store.clone());
        let carts = CartStore::new(store.clone(), stock.clone(), config.clone());
        let orders = OrderLedger::new(
            store.clone(),
            carts.clone(),
            stock.clone(),
            credit.clone(),
            config.clone(),
        );
        Self {
            config,
            store,
            stock,
            credit,
            carts,
            orders,
        }
    }

    /// Build the background reaper for this state's store and settings
    pub fn reaper(&self) -> CartReaper {
        CartReaper::new(
            self.store.clone(),
            self.carts.clone(),
            self.config.reaper_interval_secs,
            self.config.cart_expiry_ms(),
        )
    }
}
