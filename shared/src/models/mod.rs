//! Persisted records and input payloads

pub mod cart;
pub mod order;
pub mod product;
pub mod store_credit;

pub use cart::{Cart, CartItem, CartItemInput};
pub use order::{CreateOrderInput, Order, OrderLine, OrderStatus};
pub use product::Product;
pub use store_credit::StoreCredit;
