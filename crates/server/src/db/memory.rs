//! In-memory store for tests.
//!
//! Mirrors the `PostgreSQL` schema's behavior: unique email, unique
//! `(account, product)` cart lines, unique payment references, guarded
//! stock decrements and rollback of uncommitted transactions.
//!
//! A transaction holds the store's lock until it is committed or dropped,
//! so transactions are fully serialized. Never open a second transaction
//! while holding one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use bazaar_core::{AccountId, CartLineId, Email, OrderId, OrderStatus, ProductId, Quantity};

use super::{
    AccountRepository, CartLedger, Catalog, OrderLedger, RepositoryError, Store,
    TokenRepository, Transaction,
};
use crate::models::{
    Account, CartEntry, CartLine, NewOrder, NewProduct, Order, Product, ProductFilter,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: Vec<(Account, String)>,
    tokens: Vec<(String, AccountId, DateTime<Utc>)>,
    products: Vec<Product>,
    cart_lines: Vec<CartLine>,
    orders: Vec<Order>,
}

/// Store that keeps everything in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Transaction over a working copy of the store.
///
/// Writes go to the copy; [`Transaction::commit`] publishes it.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl Transaction for MemoryTx {
    async fn commit(mut self) -> Result<(), RepositoryError> {
        *self.guard = self.work;
        Ok(())
    }
}

impl MemoryTx {
    fn product_mut(&mut self, id: ProductId) -> Option<&mut Product> {
        self.work.products.iter_mut().find(|p| p.id == id)
    }

    fn cart_line_mut(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
    ) -> Option<&mut CartLine> {
        self.work
            .cart_lines
            .iter_mut()
            .find(|l| l.account_id == account_id && l.product_id == product_id)
    }

    /// Change a product's listed price. The catalog itself never reprices.
    #[cfg(test)]
    pub(crate) fn reprice(&mut self, id: ProductId, price: bazaar_core::Price) {
        if let Some(product) = self.product_mut(id) {
            product.price = price;
        }
    }
}

fn newest_first<T>(items: impl DoubleEndedIterator<Item = T>) -> Vec<T> {
    items.rev().collect()
}

impl AccountRepository for MemoryTx {
    async fn create_account(
        &mut self,
        email: &Email,
        password_hash: &str,
    ) -> Result<Account, RepositoryError> {
        if self.work.accounts.iter().any(|(a, _)| &a.email == email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let account = Account {
            id: AccountId::new(),
            email: email.clone(),
            created_at: now,
            updated_at: now,
        };
        self.work
            .accounts
            .push((account.clone(), password_hash.to_owned()));
        Ok(account)
    }

    async fn account_with_hash(
        &mut self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        Ok(self
            .work
            .accounts
            .iter()
            .find(|(a, _)| &a.email == email)
            .cloned())
    }

    async fn account(&mut self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .work
            .accounts
            .iter()
            .find(|(a, _)| a.id == id)
            .map(|(a, _)| a.clone()))
    }
}

impl TokenRepository for MemoryTx {
    async fn insert_token(
        &mut self,
        digest: &str,
        account_id: AccountId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if self.work.tokens.iter().any(|(d, _, _)| d == digest) {
            return Err(RepositoryError::Conflict(
                "token digest already exists".to_owned(),
            ));
        }
        self.work
            .tokens
            .push((digest.to_owned(), account_id, expires_at));
        Ok(())
    }

    async fn account_for_token(
        &mut self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, RepositoryError> {
        let Some(account_id) = self
            .work
            .tokens
            .iter()
            .find(|(d, _, expires_at)| d == digest && *expires_at > now)
            .map(|(_, id, _)| *id)
        else {
            return Ok(None);
        };
        self.account(account_id).await
    }
}

impl Catalog for MemoryTx {
    async fn list_products(
        &mut self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        Ok(newest_first(
            self.work
                .products
                .iter()
                .filter(|p| filter.matches(p))
                .cloned(),
        ))
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.work.products.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category.clone(),
            image_url: product.image_url.clone(),
            is_active: true,
            stock_quantity: product.stock_quantity,
            created_at: now,
            updated_at: now,
        };
        self.work.products.push(product.clone());
        Ok(product)
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        let Some(product) = self.product_mut(id) else {
            return Ok(false);
        };
        if !product.has_stock_for(quantity) {
            return Ok(false);
        }
        product.stock_quantity -= quantity.as_i32();
        product.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_active(
        &mut self,
        id: ProductId,
        active: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        Ok(self.product_mut(id).map(|product| {
            product.is_active = active;
            product.updated_at = Utc::now();
            product.clone()
        }))
    }
}

impl CartLedger for MemoryTx {
    async fn cart_entries(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<CartEntry>, RepositoryError> {
        self.work
            .cart_lines
            .iter()
            .filter(|l| l.account_id == account_id)
            .map(|line| {
                let product = self
                    .work
                    .products
                    .iter()
                    .find(|p| p.id == line.product_id)
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "cart line {} references missing product",
                            line.id
                        ))
                    })?;
                Ok(CartEntry {
                    line: line.clone(),
                    product,
                })
            })
            .collect()
    }

    async fn cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        Ok(self.cart_line_mut(account_id, product_id).map(|l| l.clone()))
    }

    async fn insert_cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        if self.cart_line_mut(account_id, product_id).is_some() {
            return Err(RepositoryError::Conflict(
                "cart line already exists".to_owned(),
            ));
        }
        let now = Utc::now();
        let line = CartLine {
            id: CartLineId::new(),
            account_id,
            product_id,
            quantity,
            added_at: now,
            updated_at: now,
        };
        self.work.cart_lines.push(line.clone());
        Ok(line)
    }

    async fn set_cart_quantity(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError> {
        Ok(self.cart_line_mut(account_id, product_id).map(|line| {
            line.quantity = quantity;
            line.updated_at = Utc::now();
            line.clone()
        }))
    }

    async fn delete_cart_line(
        &mut self,
        account_id: AccountId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let before = self.work.cart_lines.len();
        self.work
            .cart_lines
            .retain(|l| !(l.account_id == account_id && l.product_id == product_id));
        Ok(self.work.cart_lines.len() < before)
    }

    async fn clear_cart(&mut self, account_id: AccountId) -> Result<u64, RepositoryError> {
        let before = self.work.cart_lines.len();
        self.work.cart_lines.retain(|l| l.account_id != account_id);
        Ok((before - self.work.cart_lines.len()) as u64)
    }
}

impl OrderLedger for MemoryTx {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if let Some(reference) = &order.payment_reference
            && self
                .work
                .orders
                .iter()
                .any(|o| o.payment_reference.as_ref() == Some(reference))
        {
            return Err(RepositoryError::Conflict(
                "payment reference already used".to_owned(),
            ));
        }
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            account_id: order.account_id,
            total_amount: order.total_amount,
            status: order.status,
            payment_reference: order.payment_reference.clone(),
            items: order.items.clone(),
            created_at: now,
            updated_at: now,
        };
        self.work.orders.push(order.clone());
        Ok(order)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.work.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_by_payment_reference(
        &mut self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .work
            .orders
            .iter()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn orders_for_account(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<Order>, RepositoryError> {
        Ok(newest_first(
            self.work
                .orders
                .iter()
                .filter(|o| o.account_id == account_id)
                .cloned(),
        ))
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

        Ok(self
            .work
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.status == from)
            .map(|order| {
                order.status = to;
                order.updated_at = Utc::now();
                order.clone()
            }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::Price;

    use super::*;

    fn mug(stock: i32) -> NewProduct {
        NewProduct {
            name: "Mug".to_string(),
            description: None,
            price: Price::from_cents(1000),
            category: None,
            image_url: None,
            stock_quantity: stock,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_roll_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_product(&mug(1)).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let products = tx
            .list_products(&ProductFilter::default())
            .await
            .unwrap();
        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn test_committed_writes_are_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(&mug(1)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.product(product.id).await.unwrap(), Some(product));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let email = Email::parse("a@example.com").unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.create_account(&email, "hash").await.unwrap();
        let err = tx.create_account(&email, "hash").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_decrement_never_goes_negative() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(&mug(3)).await.unwrap();

        let two = Quantity::new(2).unwrap();
        assert!(tx.decrement_stock(product.id, two).await.unwrap());
        assert!(!tx.decrement_stock(product.id, two).await.unwrap());
        assert!(tx.decrement_stock(product.id, Quantity::ONE).await.unwrap());
        assert!(!tx.decrement_stock(product.id, Quantity::ONE).await.unwrap());

        let product = tx.product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 0);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let account = tx
            .create_account(&Email::parse("a@example.com").unwrap(), "hash")
            .await
            .unwrap();
        let draft =
            NewOrder::from_cart(account.id, &[], OrderStatus::Pending, Some("pi_1".to_string()))
                .unwrap();
        let order = tx.insert_order(&draft).await.unwrap();

        let done = tx
            .transition_order(order.id, OrderStatus::Pending, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.unwrap().status, OrderStatus::Completed);

        let again = tx
            .transition_order(order.id, OrderStatus::Pending, OrderStatus::Failed)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_orders_written_together_list_newest_first() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let account = tx
            .create_account(&Email::parse("a@example.com").unwrap(), "hash")
            .await
            .unwrap();
        let draft = NewOrder::from_cart(account.id, &[], OrderStatus::Completed, None).unwrap();
        let first = tx.insert_order(&draft).await.unwrap();
        let second = tx.insert_order(&draft).await.unwrap();

        let ids: Vec<OrderId> = tx
            .orders_for_account(account.id)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_transition_outside_lifecycle_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let account = tx
            .create_account(&Email::parse("a@example.com").unwrap(), "hash")
            .await
            .unwrap();
        let draft = NewOrder::from_cart(account.id, &[], OrderStatus::Completed, None).unwrap();
        let order = tx.insert_order(&draft).await.unwrap();

        for (from, to) in [
            (OrderStatus::Completed, OrderStatus::Failed),
            (OrderStatus::Pending, OrderStatus::Pending),
            (OrderStatus::Pending, OrderStatus::Refunded),
        ] {
            let err = tx.transition_order(order.id, from, to).await.unwrap_err();
            assert!(matches!(
                err,
                RepositoryError::InvalidTransition { from: f, to: t } if f == from && t == to
            ));
        }

        let stored = tx.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_expired_token_does_not_resolve() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let account = tx
            .create_account(&Email::parse("a@example.com").unwrap(), "hash")
            .await
            .unwrap();
        let now = Utc::now();
        tx.insert_token("digest", account.id, now).await.unwrap();

        assert!(tx.account_for_token("digest", now).await.unwrap().is_none());
        let earlier = now - chrono::Duration::seconds(1);
        assert_eq!(
            tx.account_for_token("digest", earlier).await.unwrap(),
            Some(account)
        );
    }
}
