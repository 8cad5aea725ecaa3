//! redb-backed storage layer
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `products` | product_id | `Product` | Catalog stock records |
//! | `carts` | cart_id | `Cart` | Pre-checkout baskets |
//! | `orders` | order_id | `Order` | Immutable order records |
//! | `store_credits` | user_id | `StoreCredit` | Per-user credit balance |
//! | `cart_owner_idx` | owner key | cart_id | One cart per owner |
//! | `cart_expiry_idx` | `(last_updated, cart_id)` | `()` | Reaper range scan |
//!
//! # Transactions
//!
//! A multi-record mutation runs inside a single redb `WriteTransaction`:
//! every method here takes the transaction by reference and the caller
//! commits. Dropping the transaction without committing aborts all writes,
//! so a failure partway through a reservation sequence leaves no partial
//! state behind.
//!
//! # Version discipline
//!
//! Records are written through `insert_*` (fails if the key exists, record
//! stays at version 0) or `put_*` (bumps the version by exactly 1).
//! `verify_*_version` compares a version captured under an earlier read
//! transaction against the stored record and fails with `VersionConflict`
//! when a concurrent writer got there first. Index maintenance for carts is
//! co-located with the cart writes so the indexes cannot drift from the
//! `carts` table within a committed transaction.

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::{Cart, Order, Owner, Product, StoreCredit, Versioned};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const PRODUCTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("products");
const CARTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("carts");
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");
const CREDITS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("store_credits");

/// Unique owner -> cart index: key = `Owner::storage_key()`, value = cart_id
const CART_OWNER_TABLE: TableDefinition<&str, &str> = TableDefinition::new("cart_owner_idx");

/// Expiry index: key = (last_updated millis, cart_id), value = ()
const CART_EXPIRY_TABLE: TableDefinition<(i64, &str), ()> = TableDefinition::new("cart_expiry_idx");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored version no longer matches the version the writer read
    #[error("Version conflict on {entity} {id}")]
    VersionConflict { entity: &'static str, id: String },

    /// Insert hit an existing key
    #[error("Duplicate {entity}: {id}")]
    DuplicateKey { entity: &'static str, id: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

fn read_json<T, Tbl>(table: &Tbl, key: &str) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key)? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

fn write_json<T: Serialize>(
    table: &mut redb::Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let bytes = serde_json::to_vec(value)?;
    table.insert(key, bytes.as_slice())?;
    Ok(())
}

fn verify_version<T, Tbl>(
    table: &Tbl,
    entity: &'static str,
    id: &str,
    expected: u64,
) -> StorageResult<()>
where
    T: DeserializeOwned + Versioned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    // A record deleted since the read counts as a conflict too
    match read_json::<T, _>(table, id)? {
        Some(current) if current.version() == expected => Ok(()),
        _ => Err(StorageError::VersionConflict {
            entity,
            id: id.to_string(),
        }),
    }
}

/// Storage service over a single redb database
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the database at `path` and initialize all tables
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and tooling)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Create all tables up front so reads never hit TableDoesNotExist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
            let _ = write_txn.open_table(CARTS_TABLE)?;
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(CREDITS_TABLE)?;
            let _ = write_txn.open_table(CART_OWNER_TABLE)?;
            let _ = write_txn.open_table(CART_EXPIRY_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction (the unit of atomicity for every
    /// multi-record mutation)
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Begin a read transaction (consistent snapshot for the read phase)
    pub fn begin_read(&self) -> StorageResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    // ========== Products ==========

    pub fn get_product(&self, txn: &ReadTransaction, id: &str) -> StorageResult<Option<Product>> {
        read_json(&txn.open_table(PRODUCTS_TABLE)?, id)
    }

    /// Fresh read inside a write transaction
    pub fn get_product_for_update(
        &self,
        txn: &WriteTransaction,
        id: &str,
    ) -> StorageResult<Option<Product>> {
        read_json(&txn.open_table(PRODUCTS_TABLE)?, id)
    }

    /// Insert a new product; the record keeps its version (0 for fresh records)
    pub fn insert_product(&self, txn: &WriteTransaction, product: &Product) -> StorageResult<()> {
        let mut table = txn.open_table(PRODUCTS_TABLE)?;
        if table.get(product.id.as_str())?.is_some() {
            return Err(StorageError::DuplicateKey {
                entity: "product",
                id: product.id.clone(),
            });
        }
        write_json(&mut table, &product.id, product)
    }

    /// Write a product, bumping its version by 1
    pub fn put_product(&self, txn: &WriteTransaction, product: &mut Product) -> StorageResult<()> {
        product.set_version(product.version() + 1);
        write_json(&mut txn.open_table(PRODUCTS_TABLE)?, &product.id, product)
    }

    /// Remove a product (catalog-side operation, used by tests to exercise
    /// the tolerant release path)
    pub fn remove_product(&self, txn: &WriteTransaction, id: &str) -> StorageResult<bool> {
        Ok(txn.open_table(PRODUCTS_TABLE)?.remove(id)?.is_some())
    }

    pub fn verify_product_version(
        &self,
        txn: &WriteTransaction,
        id: &str,
        expected: u64,
    ) -> StorageResult<()> {
        verify_version::<Product, _>(&txn.open_table(PRODUCTS_TABLE)?, "product", id, expected)
    }

    // ========== Carts ==========

    pub fn get_cart(&self, txn: &ReadTransaction, id: &str) -> StorageResult<Option<Cart>> {
        read_json(&txn.open_table(CARTS_TABLE)?, id)
    }

    pub fn get_cart_for_update(
        &self,
        txn: &WriteTransaction,
        id: &str,
    ) -> StorageResult<Option<Cart>> {
        read_json(&txn.open_table(CARTS_TABLE)?, id)
    }

    /// Look up the cart id owned by an identity
    pub fn get_cart_id_for_owner(
        &self,
        txn: &ReadTransaction,
        owner: &Owner,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(CART_OWNER_TABLE)?;
        Ok(table
            .get(owner.storage_key().as_str())?
            .map(|guard| guard.value().to_string()))
    }

    /// Insert a new cart and its owner/expiry index entries.
    ///
    /// Fails with `DuplicateKey` when the owner already has a cart; this is
    /// what enforces the at-most-one-cart-per-owner invariant on every
    /// creation path, racy or not.
    pub fn insert_cart(&self, txn: &WriteTransaction, cart: &Cart) -> StorageResult<()> {
        let owner_key = cart.owner.storage_key();
        {
            let mut owner_table = txn.open_table(CART_OWNER_TABLE)?;
            if owner_table.get(owner_key.as_str())?.is_some() {
                return Err(StorageError::DuplicateKey {
                    entity: "cart",
                    id: owner_key,
                });
            }
            owner_table.insert(owner_key.as_str(), cart.id.as_str())?;
        }
        txn.open_table(CART_EXPIRY_TABLE)?
            .insert((cart.last_updated, cart.id.as_str()), ())?;
        write_json(&mut txn.open_table(CARTS_TABLE)?, &cart.id, cart)
    }

    /// Write a cart, bumping its version and refreshing the expiry index
    pub fn put_cart(&self, txn: &WriteTransaction, cart: &mut Cart) -> StorageResult<()> {
        let mut carts = txn.open_table(CARTS_TABLE)?;
        let previous: Option<Cart> = read_json(&carts, &cart.id)?;
        cart.set_version(cart.version() + 1);
        write_json(&mut carts, &cart.id, cart)?;
        drop(carts);

        let mut expiry = txn.open_table(CART_EXPIRY_TABLE)?;
        if let Some(prev) = previous
            && prev.last_updated != cart.last_updated
        {
            expiry.remove((prev.last_updated, cart.id.as_str()))?;
        }
        expiry.insert((cart.last_updated, cart.id.as_str()), ())?;
        Ok(())
    }

    /// Remove a cart and its index entries, returning the stored record
    pub fn remove_cart(&self, txn: &WriteTransaction, id: &str) -> StorageResult<Option<Cart>> {
        let removed: Option<Cart> = {
            let mut carts = txn.open_table(CARTS_TABLE)?;
            let existing = read_json(&carts, id)?;
            if existing.is_some() {
                carts.remove(id)?;
            }
            existing
        };
        if let Some(cart) = &removed {
            txn.open_table(CART_OWNER_TABLE)?
                .remove(cart.owner.storage_key().as_str())?;
            txn.open_table(CART_EXPIRY_TABLE)?
                .remove((cart.last_updated, cart.id.as_str()))?;
        }
        Ok(removed)
    }

    pub fn verify_cart_version(
        &self,
        txn: &WriteTransaction,
        id: &str,
        expected: u64,
    ) -> StorageResult<()> {
        verify_version::<Cart, _>(&txn.open_table(CARTS_TABLE)?, "cart", id, expected)
    }

    /// Ids of carts idle since before `cutoff` (exclusive), oldest first
    pub fn expired_cart_ids(
        &self,
        txn: &ReadTransaction,
        cutoff: i64,
    ) -> StorageResult<Vec<String>> {
        let table = txn.open_table(CART_EXPIRY_TABLE)?;
        let mut ids = Vec::new();
        for entry in table.range((i64::MIN, "")..(cutoff, ""))? {
            let (key, _) = entry?;
            let (_, cart_id) = key.value();
            ids.push(cart_id.to_string());
        }
        Ok(ids)
    }

    // ========== Orders ==========

    pub fn get_order(&self, txn: &ReadTransaction, id: &str) -> StorageResult<Option<Order>> {
        read_json(&txn.open_table(ORDERS_TABLE)?, id)
    }

    pub fn get_order_for_update(
        &self,
        txn: &WriteTransaction,
        id: &str,
    ) -> StorageResult<Option<Order>> {
        read_json(&txn.open_table(ORDERS_TABLE)?, id)
    }

    pub fn insert_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        if table.get(order.id.as_str())?.is_some() {
            return Err(StorageError::DuplicateKey {
                entity: "order",
                id: order.id.clone(),
            });
        }
        write_json(&mut table, &order.id, order)
    }

    pub fn put_order(&self, txn: &WriteTransaction, order: &mut Order) -> StorageResult<()> {
        order.set_version(order.version() + 1);
        write_json(&mut txn.open_table(ORDERS_TABLE)?, &order.id, order)
    }

    pub fn verify_order_version(
        &self,
        txn: &WriteTransaction,
        id: &str,
        expected: u64,
    ) -> StorageResult<()> {
        verify_version::<Order, _>(&txn.open_table(ORDERS_TABLE)?, "order", id, expected)
    }

    /// All orders for a user, newest first
    pub fn orders_for_user(
        &self,
        txn: &ReadTransaction,
        user_id: &str,
    ) -> StorageResult<Vec<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        let mut orders = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let order: Order = serde_json::from_slice(value.value())?;
            if order.user_id == user_id {
                orders.push(order);
            }
        }
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        Ok(orders)
    }

    // ========== Store credits ==========

    pub fn get_credit(
        &self,
        txn: &ReadTransaction,
        user_id: &str,
    ) -> StorageResult<Option<StoreCredit>> {
        read_json(&txn.open_table(CREDITS_TABLE)?, user_id)
    }

    pub fn get_credit_for_update(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
    ) -> StorageResult<Option<StoreCredit>> {
        read_json(&txn.open_table(CREDITS_TABLE)?, user_id)
    }

    pub fn insert_credit(&self, txn: &WriteTransaction, credit: &StoreCredit) -> StorageResult<()> {
        let mut table = txn.open_table(CREDITS_TABLE)?;
        if table.get(credit.user_id.as_str())?.is_some() {
            return Err(StorageError::DuplicateKey {
                entity: "store_credit",
                id: credit.user_id.clone(),
            });
        }
        write_json(&mut table, &credit.user_id, credit)
    }

    pub fn put_credit(&self, txn: &WriteTransaction, credit: &mut StoreCredit) -> StorageResult<()> {
        credit.set_version(credit.version() + 1);
        write_json(&mut txn.open_table(CREDITS_TABLE)?, &credit.user_id, credit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn test_product(id: &str, stock: i64) -> Product {
        Product::new(id, format!("Product {id}"), Decimal::new(1000, 2), stock)
    }

    #[test]
    fn test_versions_increase_by_exactly_one() {
        let store = Store::open_in_memory().unwrap();
        let mut product = test_product("p1", 5);

        let txn = store.begin_write().unwrap();
        store.insert_product(&txn, &product).unwrap();
        txn.commit().unwrap();

        for expected in 1..=3u64 {
            let txn = store.begin_write().unwrap();
            store.put_product(&txn, &mut product).unwrap();
            txn.commit().unwrap();
            assert_eq!(product.version, expected);
        }

        let txn = store.begin_read().unwrap();
        let stored = store.get_product(&txn, "p1").unwrap().unwrap();
        assert_eq!(stored.version, 3);
    }

    #[test]
    fn test_verify_rejects_stale_version() {
        let store = Store::open_in_memory().unwrap();
        let mut product = test_product("p1", 5);

        let txn = store.begin_write().unwrap();
        store.insert_product(&txn, &product).unwrap();
        txn.commit().unwrap();

        // Another writer bumps the record
        let txn = store.begin_write().unwrap();
        store.put_product(&txn, &mut product.clone()).unwrap();
        txn.commit().unwrap();

        let txn = store.begin_write().unwrap();
        assert!(store.verify_product_version(&txn, "p1", 1).is_ok());
        let err = store.verify_product_version(&txn, "p1", 0).unwrap_err();
        assert!(matches!(err, StorageError::VersionConflict { .. }));
    }

    #[test]
    fn test_verify_treats_deleted_record_as_conflict() {
        let store = Store::open_in_memory().unwrap();
        let txn = store.begin_write().unwrap();
        let err = store.verify_product_version(&txn, "ghost", 0).unwrap_err();
        assert!(matches!(err, StorageError::VersionConflict { .. }));
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let product = test_product("p1", 5);

        let txn = store.begin_write().unwrap();
        store.insert_product(&txn, &product).unwrap();
        let err = store.insert_product(&txn, &product).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { .. }));
    }

    #[test]
    fn test_aborted_transaction_leaves_no_trace() {
        let store = Store::open_in_memory().unwrap();

        {
            let txn = store.begin_write().unwrap();
            store.insert_product(&txn, &test_product("p1", 5)).unwrap();
            // dropped without commit
        }

        let txn = store.begin_read().unwrap();
        assert!(store.get_product(&txn, "p1").unwrap().is_none());
    }

    #[test]
    fn test_cart_owner_index_is_unique() {
        let store = Store::open_in_memory().unwrap();
        let owner = Owner::User("u1".to_string());
        let first = Cart::new(owner.clone());
        let second = Cart::new(owner.clone());

        let txn = store.begin_write().unwrap();
        store.insert_cart(&txn, &first).unwrap();
        let err = store.insert_cart(&txn, &second).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { .. }));
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        assert_eq!(
            store.get_cart_id_for_owner(&txn, &owner).unwrap().unwrap(),
            first.id
        );
    }

    #[test]
    fn test_remove_cart_clears_indexes() {
        let store = Store::open_in_memory().unwrap();
        let owner = Owner::Guest("g1".to_string());
        let cart = Cart::new(owner.clone());

        let txn = store.begin_write().unwrap();
        store.insert_cart(&txn, &cart).unwrap();
        txn.commit().unwrap();

        let txn = store.begin_write().unwrap();
        assert!(store.remove_cart(&txn, &cart.id).unwrap().is_some());
        // Second removal is a no-op
        assert!(store.remove_cart(&txn, &cart.id).unwrap().is_none());
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        assert!(store.get_cart_id_for_owner(&txn, &owner).unwrap().is_none());
        assert!(
            store
                .expired_cart_ids(&txn, i64::MAX)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_expiry_index_follows_cart_updates() {
        let store = Store::open_in_memory().unwrap();
        let mut cart = Cart::new(Owner::User("u1".to_string()));
        cart.last_updated = 1_000;

        let txn = store.begin_write().unwrap();
        store.insert_cart(&txn, &cart).unwrap();
        txn.commit().unwrap();

        // Touch the cart: the old index entry must disappear
        let txn = store.begin_write().unwrap();
        cart.last_updated = 5_000;
        store.put_cart(&txn, &mut cart).unwrap();
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        assert!(store.expired_cart_ids(&txn, 5_000).unwrap().is_empty());
        assert_eq!(store.expired_cart_ids(&txn, 5_001).unwrap(), vec![cart.id]);
    }

    #[test]
    fn test_expired_cart_ids_cutoff_is_exclusive() {
        let store = Store::open_in_memory().unwrap();
        let mut old_cart = Cart::new(Owner::User("u1".to_string()));
        old_cart.last_updated = 1_000;
        let mut fresh_cart = Cart::new(Owner::User("u2".to_string()));
        fresh_cart.last_updated = 2_000;

        let txn = store.begin_write().unwrap();
        store.insert_cart(&txn, &old_cart).unwrap();
        store.insert_cart(&txn, &fresh_cart).unwrap();
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        assert_eq!(
            store.expired_cart_ids(&txn, 2_000).unwrap(),
            vec![old_cart.id.clone()]
        );
        let all = store.expired_cart_ids(&txn, 2_001).unwrap();
        assert_eq!(all, vec![old_cart.id, fresh_cart.id]);
    }

    #[test]
    fn test_orders_for_user_filters_and_sorts() {
        let store = Store::open_in_memory().unwrap();
        let mut first = Order::new(
            "u1",
            Vec::new(),
            Decimal::TEN,
            Decimal::ZERO,
            Decimal::TWO,
            "addr",
        );
        first.created_at = 1_000;
        let mut second = Order::new(
            "u1",
            Vec::new(),
            Decimal::TEN,
            Decimal::ZERO,
            Decimal::TWO,
            "addr",
        );
        second.created_at = 2_000;
        let other = Order::new(
            "u2",
            Vec::new(),
            Decimal::TEN,
            Decimal::ZERO,
            Decimal::TWO,
            "addr",
        );

        let txn = store.begin_write().unwrap();
        store.insert_order(&txn, &first).unwrap();
        store.insert_order(&txn, &second).unwrap();
        store.insert_order(&txn, &other).unwrap();
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        let orders = store.orders_for_user(&txn, "u1").unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, second.id);
        assert_eq!(orders[1].id, first.id);
    }

    #[test]
    fn test_on_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fulfillment.redb");

        {
            let store = Store::open(&path).unwrap();
            let txn = store.begin_write().unwrap();
            store.insert_product(&txn, &test_product("p1", 7)).unwrap();
            txn.commit().unwrap();
        }

        let store = Store::open(&path).unwrap();
        let txn = store.begin_read().unwrap();
        let product = store.get_product(&txn, "p1").unwrap().unwrap();
        assert_eq!(product.stock, 7);
    }
}
