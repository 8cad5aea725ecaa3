//! Storefront fulfillment core
//!
//! Embedded order-fulfillment engine: carts, stock reservation, store
//! credit, checkout and the order status state machine, all backed by a
//! single redb database with optimistic version checks on every record.
//!
//! # Module structure
//!
//! ```text
//! fulfillment-core/src/
//! ├── core/          # Config, AppState wiring
//! ├── common/        # Error types, logger setup
//! ├── storage/       # redb tables, transactions, version discipline
//! ├── stock/         # StockLedger: reserve / release
//! ├── credit/        # CreditLedger: apply / issue
//! ├── cart/          # CartStore: mutable pre-checkout baskets
//! ├── orders/        # OrderLedger: checkout, status transitions, cancellation
//! └── reaper/        # CartReaper: background reclamation of idle carts
//! ```

pub mod cart;
pub mod common;
pub mod core;
pub mod credit;
pub mod money;
pub mod orders;
pub mod reaper;
pub mod stock;
pub mod storage;

pub use cart::CartStore;
pub use common::{CoreError, CoreResult};
pub use common::logger::init_logger;
pub use core::{AppState, Config};
pub use credit::CreditLedger;
pub use orders::OrderLedger;
pub use reaper::CartReaper;
pub use stock::StockLedger;
pub use storage::Store;

#[cfg(test)]
mod tests;
