//! Cart store
//!
//! Owns the mutable pre-checkout basket and composes the stock ledger for
//! the reservation side effects of every mutation. Each operation follows
//! the optimistic pattern: read the cart under a read transaction
//! (capturing its version), compute, then re-verify the version inside a
//! write transaction before applying. A concurrent mutation in the window
//! surfaces as `ConcurrencyConflict` and the caller retries the whole
//! operation with fresh state.

use crate::common::error::{CoreError, CoreResult};
use crate::core::config::Config;
use crate::stock::StockLedger;
use crate::storage::{StorageError, Store};
use shared::{Cart, CartItem, CartItemInput, Owner, util};
use std::collections::HashSet;
use validator::Validate;

#[derive(Clone)]
pub struct CartStore {
    store: Store,
    stock: StockLedger,
    config: Config,
}

impl CartStore {
    pub fn new(store: Store, stock: StockLedger, config: Config) -> Self {
        Self {
            store,
            stock,
            config,
        }
    }

    fn load_by_owner(&self, owner: &Owner) -> CoreResult<Option<Cart>> {
        let txn = self.store.begin_read()?;
        let Some(cart_id) = self.store.get_cart_id_for_owner(&txn, owner)? else {
            return Ok(None);
        };
        Ok(self.store.get_cart(&txn, &cart_id)?)
    }

    fn validate_items(&self, items: &[CartItemInput]) -> CoreResult<()> {
        if items.is_empty() {
            return Err(CoreError::InvalidInput("item list must not be empty".into()));
        }
        if items.len() > self.config.max_cart_items {
            return Err(CoreError::InvalidInput(format!(
                "cart may hold at most {} distinct products",
                self.config.max_cart_items
            )));
        }
        let mut seen = HashSet::new();
        for item in items {
            item.validate()?;
            if !seen.insert(item.product_id.as_str()) {
                return Err(CoreError::InvalidInput(format!(
                    "duplicate product in item list: {}",
                    item.product_id
                )));
            }
        }
        Ok(())
    }

    /// The cart for an owner.
    ///
    /// A cart idle past the expiry threshold is reclaimed on the spot
    /// (stock released, cart deleted) and the call fails with `CartExpired`
    /// instead of handing out stale contents.
    pub fn get(&self, owner: &Owner) -> CoreResult<Cart> {
        let Some(cart) = self.load_by_owner(owner)? else {
            return Err(CoreError::NotFound {
                entity: "cart",
                id: owner.storage_key(),
            });
        };

        if cart.is_expired(util::now_ms(), self.config.cart_expiry_ms()) {
            let cart_id = cart.id.clone();
            if self.reclaim(&cart_id)? {
                return Err(CoreError::CartExpired { cart_id });
            }
            // Another session refreshed the cart between our read and the
            // reclaim; hand out the fresh copy
            if let Some(fresh) = self.load_by_owner(owner)?
                && !fresh.is_expired(util::now_ms(), self.config.cart_expiry_ms())
            {
                return Ok(fresh);
            }
            return Err(CoreError::CartExpired { cart_id });
        }
        Ok(cart)
    }

    /// Create a cart for an owner, reserving stock for every item.
    ///
    /// Fails with `AlreadyExists` when the owner already has a cart. If any
    /// reservation fails partway, the whole transaction aborts and no prior
    /// reservation in this call leaks.
    pub fn create(&self, owner: Owner, items: Vec<CartItemInput>) -> CoreResult<Cart> {
        self.validate_items(&items)?;
        if self.load_by_owner(&owner)?.is_some() {
            return Err(CoreError::AlreadyExists(format!(
                "cart for {}",
                owner.storage_key()
            )));
        }

        let mut cart = Cart::new(owner);
        cart.items = items
            .iter()
            .map(|i| CartItem {
                product_id: i.product_id.clone(),
                quantity: i.quantity,
            })
            .collect();

        let txn = self.store.begin_write()?;
        for item in &cart.items {
            self.stock.reserve(&txn, &item.product_id, item.quantity)?;
        }
        self.store.insert_cart(&txn, &cart)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(cart_id = %cart.id, owner = %cart.owner, items = cart.items.len(), "Cart created");
        Ok(cart)
    }

    /// Replace a cart's contents wholesale.
    ///
    /// `expected_version` is the version the caller last read; a concurrent
    /// mutation since then fails the call with `ConcurrencyConflict`. Stock
    /// held by the old items is released and stock for the new items
    /// reserved within the same transaction.
    pub fn update(
        &self,
        cart_id: &str,
        owner: &Owner,
        expected_version: u64,
        new_items: Vec<CartItemInput>,
    ) -> CoreResult<Cart> {
        self.validate_items(&new_items)?;

        let mut cart = {
            let txn = self.store.begin_read()?;
            self.store
                .get_cart(&txn, cart_id)?
                .ok_or_else(|| CoreError::NotFound {
                    entity: "cart",
                    id: cart_id.to_string(),
                })?
        };
        if cart.owner != *owner {
            return Err(CoreError::Unauthorized(format!(
                "cart {cart_id} does not belong to {owner}"
            )));
        }

        let txn = self.store.begin_write()?;
        self.store
            .verify_cart_version(&txn, cart_id, expected_version)?;
        for item in &cart.items {
            self.stock.release(&txn, &item.product_id, item.quantity)?;
        }
        cart.items = new_items
            .iter()
            .map(|i| CartItem {
                product_id: i.product_id.clone(),
                quantity: i.quantity,
            })
            .collect();
        for item in &cart.items {
            self.stock.reserve(&txn, &item.product_id, item.quantity)?;
        }
        cart.last_updated = util::now_ms();
        self.store.put_cart(&txn, &mut cart)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(cart_id, items = cart.items.len(), "Cart updated");
        Ok(cart)
    }

    /// Add a quantity of one product, merging into an existing line.
    ///
    /// The one cart path that tolerates "no cart yet": a missing cart is
    /// created with this single item instead of failing.
    pub fn add_item(&self, owner: &Owner, product_id: &str, quantity: u32) -> CoreResult<Cart> {
        let input = CartItemInput {
            product_id: product_id.to_string(),
            quantity,
        };
        input.validate()?;

        match self.load_by_owner(owner)? {
            Some(mut cart) => {
                let read_version = cart.version;
                match cart.items.iter_mut().find(|i| i.product_id == product_id) {
                    Some(line) => line.quantity += quantity,
                    None => {
                        if cart.items.len() >= self.config.max_cart_items {
                            return Err(CoreError::InvalidInput(format!(
                                "cart may hold at most {} distinct products",
                                self.config.max_cart_items
                            )));
                        }
                        cart.items.push(CartItem {
                            product_id: product_id.to_string(),
                            quantity,
                        });
                    }
                }

                let txn = self.store.begin_write()?;
                self.store.verify_cart_version(&txn, &cart.id, read_version)?;
                self.stock.reserve(&txn, product_id, quantity)?;
                cart.last_updated = util::now_ms();
                self.store.put_cart(&txn, &mut cart)?;
                txn.commit().map_err(StorageError::from)?;

                tracing::debug!(cart_id = %cart.id, product_id, quantity, "Item added to cart");
                Ok(cart)
            }
            None => {
                let mut cart = Cart::new(owner.clone());
                cart.items.push(CartItem {
                    product_id: product_id.to_string(),
                    quantity,
                });

                let txn = self.store.begin_write()?;
                self.stock.reserve(&txn, product_id, quantity)?;
                // A racing first add for the same owner wins the unique
                // owner index; surface that as a conflict so the caller
                // retries into the merge path
                match self.store.insert_cart(&txn, &cart) {
                    Ok(()) => {}
                    Err(StorageError::DuplicateKey { .. }) => {
                        return Err(CoreError::ConcurrencyConflict {
                            entity: "cart",
                            id: owner.storage_key(),
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
                txn.commit().map_err(StorageError::from)?;

                tracing::info!(cart_id = %cart.id, owner = %cart.owner, "Cart created on first add");
                Ok(cart)
            }
        }
    }

    /// Remove one product line entirely, releasing its reserved stock
    pub fn remove_item(&self, owner: &Owner, product_id: &str) -> CoreResult<Cart> {
        let Some(mut cart) = self.load_by_owner(owner)? else {
            return Err(CoreError::NotFound {
                entity: "cart",
                id: owner.storage_key(),
            });
        };
        let read_version = cart.version;

        let Some(position) = cart.items.iter().position(|i| i.product_id == product_id) else {
            return Err(CoreError::NotFound {
                entity: "cart item",
                id: product_id.to_string(),
            });
        };
        let removed = cart.items.remove(position);

        let txn = self.store.begin_write()?;
        self.store.verify_cart_version(&txn, &cart.id, read_version)?;
        self.stock.release(&txn, &removed.product_id, removed.quantity)?;
        cart.last_updated = util::now_ms();
        self.store.put_cart(&txn, &mut cart)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::debug!(cart_id = %cart.id, product_id, "Item removed from cart");
        Ok(cart)
    }

    /// Empty a cart, releasing stock for every held item. The cart record
    /// itself survives (contrast with checkout, which deletes it).
    pub fn clear(&self, owner: &Owner) -> CoreResult<Cart> {
        let Some(mut cart) = self.load_by_owner(owner)? else {
            return Err(CoreError::NotFound {
                entity: "cart",
                id: owner.storage_key(),
            });
        };
        let read_version = cart.version;

        let txn = self.store.begin_write()?;
        self.store.verify_cart_version(&txn, &cart.id, read_version)?;
        for item in &cart.items {
            self.stock.release(&txn, &item.product_id, item.quantity)?;
        }
        cart.items.clear();
        cart.last_updated = util::now_ms();
        self.store.put_cart(&txn, &mut cart)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(cart_id = %cart.id, "Cart cleared");
        Ok(cart)
    }

    /// Release all held stock and delete an expired cart, in one
    /// transaction.
    ///
    /// Shared by expiry-on-read and the background reaper. Idempotent:
    /// reclaiming an id that is already gone returns `Ok(false)`. The
    /// caller's expiry decision was made against an earlier snapshot, so
    /// expiry is re-checked on the fresh read here; a cart the owner
    /// touched in the window is fresh again and survives.
    pub fn reclaim(&self, cart_id: &str) -> CoreResult<bool> {
        let txn = self.store.begin_write()?;
        let Some(cart) = self.store.get_cart_for_update(&txn, cart_id)? else {
            return Ok(false);
        };
        if !cart.is_expired(util::now_ms(), self.config.cart_expiry_ms()) {
            return Ok(false);
        }
        for item in &cart.items {
            // Missing products are logged inside release and skipped; a
            // vanished product must not keep an abandoned cart alive
            self.stock.release(&txn, &item.product_id, item.quantity)?;
        }
        self.store.remove_cart(&txn, cart_id)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(cart_id, owner = %cart.owner, "Abandoned cart reclaimed");
        Ok(true)
    }

    /// Delete a cart at checkout without releasing stock; the reservation
    /// bookkeeping transfers from the cart to the order being written in
    /// the same transaction.
    pub(crate) fn drain_for_order(
        &self,
        txn: &redb::WriteTransaction,
        cart: &Cart,
    ) -> CoreResult<()> {
        self.store.verify_cart_version(txn, &cart.id, cart.version)?;
        self.store.remove_cart(txn, &cart.id)?;
        Ok(())
    }
}
