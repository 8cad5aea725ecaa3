//! Shared domain types for the storefront fulfillment core
//!
//! This crate holds the records persisted by `fulfillment-core` and the
//! input payloads accepted from collaborator crates (HTTP layer, admin
//! tooling). It carries no storage or runtime dependencies so that thin
//! clients can link it directly.

pub mod models;
pub mod owner;
pub mod util;
pub mod versioned;

pub use models::{
    Cart, CartItem, CartItemInput, CreateOrderInput, Order, OrderLine, OrderStatus, Product,
    StoreCredit,
};
pub use owner::Owner;
pub use versioned::Versioned;
