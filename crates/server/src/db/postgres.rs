//! `PostgreSQL` implementation of the ledgers.
//!
//! Queries are checked at runtime with `query_as` and `FromRow` row types,
//! so the crate builds without a live database.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};

use bazaar_core::{
    AccountId, CartLineId, Email, OrderId, OrderStatus, Price, ProductId, Quantity,
};

use super::{
    AccountRepository, CartLedger, Catalog, OrderLedger, RepositoryError, Store,
    TokenRepository, Transaction,
};
use crate::models::{
    Account, CartEntry, CartLine, LineItem, NewOrder, NewProduct, Order, Product, ProductFilter,
};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Production store backed by a connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// An open database transaction. Rolls back when dropped uncommitted.
pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl Transaction for PgTx {
    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Row types
// =============================================================================

const ACCOUNT_COLUMNS: &str = "id, email, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, image_url, is_active, \
                               stock_quantity, created_at, updated_at";

const CART_LINE_COLUMNS: &str = "id, account_id, product_id, quantity, added_at, updated_at";

const ORDER_COLUMNS: &str = "id, account_id, total_amount, status, payment_reference, items, \
                             created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: AccountId,
    email: Email,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccountHashRow {
    #[sqlx(flatten)]
    account: AccountRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    price: Price,
    category: Option<String>,
    image_url: Option<String>,
    is_active: bool,
    stock_quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            category: row.category,
            image_url: row.image_url,
            is_active: row.is_active,
            stock_quantity: row.stock_quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartLineId,
    account_id: AccountId,
    product_id: ProductId,
    quantity: i32,
    added_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::from_i64(i64::from(row.quantity)).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid quantity on cart line {}: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            account_id: row.account_id,
            product_id: row.product_id,
            quantity,
            added_at: row.added_at,
            updated_at: row.updated_at,
        })
    }
}

/// A cart line joined with its product. Product columns are prefixed `p_`.
#[derive(sqlx::FromRow)]
struct CartEntryRow {
    #[sqlx(flatten)]
    line: CartLineRow,
    p_name: String,
    p_description: Option<String>,
    p_price: Price,
    p_category: Option<String>,
    p_image_url: Option<String>,
    p_is_active: bool,
    p_stock_quantity: i32,
    p_created_at: DateTime<Utc>,
    p_updated_at: DateTime<Utc>,
}

impl TryFrom<CartEntryRow> for CartEntry {
    type Error = RepositoryError;

    fn try_from(row: CartEntryRow) -> Result<Self, Self::Error> {
        let line = CartLine::try_from(row.line)?;
        let product = Product {
            id: line.product_id,
            name: row.p_name,
            description: row.p_description,
            price: row.p_price,
            category: row.p_category,
            image_url: row.p_image_url,
            is_active: row.p_is_active,
            stock_quantity: row.p_stock_quantity,
            created_at: row.p_created_at,
            updated_at: row.p_updated_at,
        };
        Ok(Self { line, product })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    account_id: AccountId,
    total_amount: Price,
    status: OrderStatus,
    payment_reference: Option<String>,
    items: Json<Vec<LineItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            total_amount: row.total_amount,
            status: row.status,
            payment_reference: row.payment_reference,
            items: row.items.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Accounts and tokens
// =============================================================================

impl AccountRepository for PgTx {
    async fn create_account(
        &mut self,
        email: &Email,
        password_hash: &str,
    ) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO account (id, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(AccountId::new())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| conflict_on_unique(e, "email already exists"))?;

        Ok(row.into())
    }

    async fn account_with_hash(
        &mut self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountHashRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS}, password_hash FROM account WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| (r.account.into(), r.password_hash)))
    }

    async fn account(&mut self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Account::from))
    }
}

impl TokenRepository for PgTx {
    async fn insert_token(
        &mut self,
        digest: &str,
        account_id: AccountId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO access_token (digest, account_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(digest)
        .bind(account_id)
        .bind(expires_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| conflict_on_unique(e, "token digest already exists"))?;

        Ok(())
    }

    async fn account_for_token(
        &mut self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT a.id, a.email, a.created_at, a.updated_at \
             FROM access_token t JOIN account a ON a.id = t.account_id \
             WHERE t.digest = $1 AND t.expires_at > $2",
        )
        .bind(digest)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Account::from))
    }
}

// =============================================================================
// Catalog
// =============================================================================

impl Catalog for PgTx {
    async fn list_products(
        &mut self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product \
             WHERE ($1::text IS NULL OR category = $1) AND (NOT $2 OR is_active) \
             ORDER BY created_at DESC"
        ))
        .bind(filter.category.as_deref())
        .bind(filter.active_only)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO product (id, name, description, price, category, image_url, stock_quantity) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(ProductId::new())
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price)
        .bind(product.category.as_deref())
        .bind(product.image_url.as_deref())
        .bind(product.stock_quantity)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE product SET stock_quantity = stock_quantity - $2, updated_at = now() \
             WHERE id = $1 AND stock_quantity >= $2",
        )
        .bind(id)
        .bind(quantity.as_i32())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_active(
        &mut self,
        id: ProductId,
        active: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE product SET is_active = $2, updated_at = now() WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }
}

// =============================================================================
// Cart
// =============================================================================

impl CartLedger for PgTx {
    async fn cart_entries(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<CartEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartEntryRow>(
            "SELECT c.id, c.account_id, c.product_id, c.quantity, c.added_at, c.updated_at, \
                    p.name AS p_name, p.description AS p_description, p.price AS p_price, \
                    p.category AS p_category, p.image_url AS p_image_url, \
                    p.is_active AS p_is_active, p.stock_quantity AS p_stock_quantity, \
                    p.created_at AS p_created_at, p.updated_at AS p_updated_at \
             FROM cart_line c JOIN product p ON p.id = c.product_id \
             WHERE c.account_id = $1 \
             ORDER BY c.added_at, c.id",
        )
        .bind(account_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(CartEntry::try_from).collect()
    }

    async fn cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(&format!(
            "SELECT {CART_LINE_COLUMNS} FROM cart_line WHERE account_id = $1 AND product_id = $2"
        ))
        .bind(account_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn insert_cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(&format!(
            "INSERT INTO cart_line (id, account_id, product_id, quantity) VALUES ($1, $2, $3, $4) \
             RETURNING {CART_LINE_COLUMNS}"
        ))
        .bind(CartLineId::new())
        .bind(account_id)
        .bind(product_id)
        .bind(quantity.as_i32())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| conflict_on_unique(e, "cart line already exists"))?;

        row.try_into()
    }

    async fn set_cart_quantity(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(&format!(
            "UPDATE cart_line SET quantity = $3, updated_at = now() \
             WHERE account_id = $1 AND product_id = $2 \
             RETURNING {CART_LINE_COLUMNS}"
        ))
        .bind(account_id)
        .bind(product_id)
        .bind(quantity.as_i32())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn delete_cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_line WHERE account_id = $1 AND product_id = $2")
            .bind(account_id)
            .bind(product_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, account_id: AccountId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_line WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Orders
// =============================================================================

impl OrderLedger for PgTx {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO \"order\" (id, account_id, total_amount, status, payment_reference, items) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(OrderId::new())
        .bind(order.account_id)
        .bind(order.total_amount)
        .bind(order.status)
        .bind(order.payment_reference.as_deref())
        .bind(Json(&order.items))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| conflict_on_unique(e, "payment reference already used"))?;

        Ok(row.into())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM \"order\" WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn order_by_payment_reference(
        &mut self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM \"order\" WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn orders_for_account(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM \"order\" WHERE account_id = $1 \
             ORDER BY created_at DESC, seq DESC"
        ))
        .bind(account_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn transition_order(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        if !from.can_transition_to(to) {
            return Err(RepositoryError::InvalidTransition { from, to });
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE \"order\" SET status = $3, updated_at = now() \
             WHERE id = $1 AND status = $2 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Order::from))
    }
}
