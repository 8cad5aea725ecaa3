//! Order ledger
//!
//! Turns a cart into an immutable order and walks the order through its
//! status state machine. Checkout touches the cart, the product records,
//! the new order and the buyer's store credit inside one write
//! transaction, so the whole thing commits or none of it does.
//!
//! Stock for the cart's items was already reserved when they were added to
//! the cart; checkout does not reserve again. It only transfers the
//! reservation's bookkeeping from "held by cart" to "held by order" by
//! writing the order and deleting the cart *without* releasing stock.

use crate::cart::CartStore;
use crate::common::error::{CoreError, CoreResult};
use crate::core::config::Config;
use crate::credit::CreditLedger;
use crate::money;
use crate::stock::StockLedger;
use crate::storage::{StorageError, Store};
use rust_decimal::Decimal;
use shared::{CreateOrderInput, Order, OrderLine, OrderStatus, Owner};
use validator::Validate;

#[derive(Clone)]
pub struct OrderLedger {
    store: Store,
    cart: CartStore,
    stock: StockLedger,
    credit: CreditLedger,
    config: Config,
}

impl OrderLedger {
    pub fn new(
        store: Store,
        cart: CartStore,
        stock: StockLedger,
        credit: CreditLedger,
        config: Config,
    ) -> Self {
        Self {
            store,
            cart,
            stock,
            credit,
            config,
        }
    }

    /// Create a pending order from the user's cart.
    ///
    /// Prices come from the product records current at commit time, not
    /// from anything cached at add-to-cart time. The payable amount is
    /// line totals + flat shipping fee − applied store credit. The cart is
    /// deleted without releasing its stock (the order owns the reservation
    /// now); any failure rolls back every write including the credit
    /// deduction.
    pub fn create_order(&self, user_id: &str, input: CreateOrderInput) -> CoreResult<Order> {
        input.validate()?;
        let owner = Owner::User(user_id.to_string());

        // Expiry reclamation happens here if the cart aged out
        let cart = self.cart.get(&owner)?;
        if cart.items.is_empty() {
            return Err(CoreError::CartEmpty);
        }

        let txn = self.store.begin_write()?;

        let mut lines = Vec::with_capacity(cart.items.len());
        let mut subtotal = Decimal::ZERO;
        for item in &cart.items {
            let product = self
                .store
                .get_product_for_update(&txn, &item.product_id)?
                .ok_or_else(|| CoreError::NotFound {
                    entity: "product",
                    id: item.product_id.clone(),
                })?;
            subtotal += money::line_total(product.price, item.quantity);
            lines.push(OrderLine {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price: product.price,
            });
        }

        let payable_before_credit = money::round(subtotal + self.config.shipping_fee);
        let (amount, credit_applied) = self.credit.apply(&txn, user_id, payable_before_credit)?;

        let order = Order::new(
            user_id,
            lines,
            amount,
            credit_applied,
            self.config.shipping_fee,
            input.address,
        );
        self.store.insert_order(&txn, &order)?;
        self.cart.drain_for_order(&txn, &cart)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            order_id = %order.id,
            user_id,
            amount = %order.amount,
            credit_applied = %order.credit_applied,
            "Order created"
        );
        Ok(order)
    }

    /// A single order by id
    pub fn get_order(&self, order_id: &str) -> CoreResult<Order> {
        let txn = self.store.begin_read()?;
        self.store
            .get_order(&txn, order_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
    }

    /// All orders for a user, newest first
    pub fn get_orders(&self, user_id: &str) -> CoreResult<Vec<Order>> {
        let txn = self.store.begin_read()?;
        Ok(self.store.orders_for_user(&txn, user_id)?)
    }

    /// Move an order to a new status.
    ///
    /// Rejects transitions the state machine does not allow and applies
    /// the optimistic version check on the write.
    pub fn update_status(&self, order_id: &str, new_status: OrderStatus) -> CoreResult<Order> {
        let mut order = self.get_order(order_id)?;
        if !order.status.can_transition_to(new_status) {
            return Err(CoreError::InvalidStateTransition {
                from: order.status,
                to: new_status,
            });
        }
        let read_version = order.version;

        let txn = self.store.begin_write()?;
        self.store.verify_order_version(&txn, order_id, read_version)?;
        let previous = order.status;
        order.status = new_status;
        self.store.put_order(&txn, &mut order)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id, from = %previous, to = %new_status, "Order status updated");
        Ok(order)
    }

    /// Cancel an order and refund its amount as store credit.
    ///
    /// Pending orders never shipped, so their reserved stock goes back to
    /// the ledger (products deleted in the meantime are logged, not
    /// fatal). The refund is issued with the configured validity window.
    /// A version conflict on the order write aborts the whole
    /// cancellation, credit issuance included.
    pub fn cancel_order_and_issue_store_credit(&self, order_id: &str) -> CoreResult<Order> {
        let mut order = self.get_order(order_id)?;
        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            // Covers already-cancelled and delivered orders
            return Err(CoreError::InvalidStateTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
        let read_version = order.version;

        let txn = self.store.begin_write()?;
        self.store.verify_order_version(&txn, order_id, read_version)?;
        if order.status == OrderStatus::Pending {
            for line in &order.items {
                self.stock.release(&txn, &line.product_id, line.quantity)?;
            }
        }
        self.credit.issue(
            &txn,
            &order.user_id,
            order.amount,
            self.config.credit_validity_ms(),
        )?;
        order.status = OrderStatus::Cancelled;
        self.store.put_order(&txn, &mut order)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            order_id,
            user_id = %order.user_id,
            refunded = %order.amount,
            "Order cancelled, store credit issued"
        );
        Ok(order)
    }
}
