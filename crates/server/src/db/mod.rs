//! Persistence for the shop.
//!
//! # Database: `bazaar`
//!
//! ## Tables
//!
//! - `account` - Shoppers and their argon2 credential hashes
//! - `access_token` - SHA-256 digests of issued bearer tokens
//! - `product` - Catalog with price and stock
//! - `cart_line` - One row per `(account, product)` in a cart
//! - `"order"` - Purchase attempts with a JSONB item snapshot
//!
//! # Access pattern
//!
//! Services never touch a pool directly. They call [`Store::begin`], run one
//! operation's reads and writes through the ledger traits on the returned
//! [`Transaction`], and [`Transaction::commit`]. A transaction dropped
//! without committing rolls back.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! ```

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use bazaar_core::{AccountId, Email, OrderId, OrderStatus, ProductId, Quantity};

use crate::models::{
    Account, CartEntry, CartLine, NewOrder, NewProduct, Order, Product, ProductFilter,
};

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryStore, MemoryTx};
pub use postgres::{PgStore, PgTx, create_pool};

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value failed validation on the way out.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Row not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The order lifecycle does not allow this status change.
    #[error("invalid order transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Accounts and their credential hashes.
pub trait AccountRepository {
    /// Insert a new account.
    ///
    /// Returns `RepositoryError::Conflict` if the email is taken.
    fn create_account(
        &mut self,
        email: &Email,
        password_hash: &str,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    /// Look up an account and its stored credential hash by email.
    fn account_with_hash(
        &mut self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<(Account, String)>, RepositoryError>> + Send;

    /// Look up an account by ID.
    fn account(
        &mut self,
        id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, RepositoryError>> + Send;
}

/// Bearer token digests.
pub trait TokenRepository {
    /// Record a token digest for an account.
    fn insert_token(
        &mut self,
        digest: &str,
        account_id: AccountId,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Resolve an unexpired token digest to its account.
    fn account_for_token(
        &mut self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Account>, RepositoryError>> + Send;
}

/// Products, prices and stock.
pub trait Catalog {
    /// List products matching a filter, newest first.
    fn list_products(
        &mut self,
        filter: &ProductFilter,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// Get a product by ID regardless of whether it is active.
    fn product(
        &mut self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Insert a product.
    fn insert_product(
        &mut self,
        product: &NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Decrement stock by `quantity` only if enough is on hand.
    ///
    /// Returns `false` (and changes nothing) when stock is insufficient or
    /// the product does not exist.
    fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Activate or deactivate a product.
    fn set_active(
        &mut self,
        id: ProductId,
        active: bool,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;
}

/// Per-account cart lines.
pub trait CartLedger {
    /// All lines of an account's cart joined with their products, oldest first.
    fn cart_entries(
        &mut self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<CartEntry>, RepositoryError>> + Send;

    /// The line for one `(account, product)` pair.
    fn cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<CartLine>, RepositoryError>> + Send;

    /// Insert a new line.
    ///
    /// Returns `RepositoryError::Conflict` if the pair already has a line.
    fn insert_cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<CartLine, RepositoryError>> + Send;

    /// Replace the quantity on an existing line.
    fn set_cart_quantity(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Option<CartLine>, RepositoryError>> + Send;

    /// Delete one line. Returns whether a line existed.
    fn delete_cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete every line of an account's cart. Returns the number removed.
    fn clear_cart(
        &mut self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Orders keyed by ID and by payment reference.
pub trait OrderLedger {
    /// Insert an order with its item snapshot.
    fn insert_order(
        &mut self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Get an order by ID.
    fn order(
        &mut self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Get the order created for a payment intent.
    fn order_by_payment_reference(
        &mut self,
        reference: &str,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// All orders of an account, newest first.
    fn orders_for_account(
        &mut self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Move an order from `from` to `to` if it is still in `from`.
    ///
    /// Returns the updated order, or `None` if the order was not in `from`
    /// (another request won the race) or does not exist. Fails with
    /// `RepositoryError::InvalidTransition` when the lifecycle forbids
    /// `from -> to`.
    fn transition_order(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;
}

/// One unit of work across every ledger.
pub trait Transaction:
    AccountRepository + TokenRepository + Catalog + CartLedger + OrderLedger + Send
{
    /// Make every write in this transaction durable.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Factory of transactions.
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: Transaction;

    /// Open a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;

    /// Check that the backing database is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
