//! Cart service.
//!
//! Every mutation runs in one transaction and returns the recomputed cart.
//! Stock is checked against the product at mutation time only; nothing is
//! reserved.

use tracing::instrument;

use bazaar_core::{AccountId, ProductId, Quantity};

use super::ShopError;
use crate::db::{CartLedger, Catalog, Store, Transaction};
use crate::models::{CartView, Product};

/// Cart service.
pub struct CartService<'a, S> {
    store: &'a S,
}

fn out_of_stock(product: &Product) -> ShopError {
    ShopError::OutOfStock {
        product: product.name.clone(),
        available: product.stock_quantity,
    }
}

impl<'a, S: Store> CartService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The account's cart with its live total.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Repository` if the query fails.
    pub async fn view(&self, account_id: AccountId) -> Result<CartView, ShopError> {
        let mut tx = self.store.begin().await?;
        let entries = tx.cart_entries(account_id).await?;
        tx.commit().await?;
        Ok(CartView::new(entries))
    }

    /// Add units of a product, summing with any existing line.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the product is missing or inactive.
    /// Returns `ShopError::OutOfStock` if the resulting quantity exceeds stock.
    #[instrument(skip(self), fields(account_id = %account_id, product_id = %product_id))]
    pub async fn add(
        &self,
        account_id: AccountId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartView, ShopError> {
        let mut tx = self.store.begin().await?;

        let product = tx
            .product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(ShopError::NotFound("Product"))?;

        let existing = tx.cart_line(account_id, product_id).await?;
        let wanted = match &existing {
            Some(line) => line
                .quantity
                .checked_add(quantity)
                .map_err(|_| out_of_stock(&product))?,
            None => quantity,
        };
        if !product.has_stock_for(wanted) {
            return Err(out_of_stock(&product));
        }

        if existing.is_some() {
            tx.set_cart_quantity(account_id, product_id, wanted).await?;
        } else {
            tx.insert_cart_line(account_id, product_id, wanted).await?;
        }

        let entries = tx.cart_entries(account_id).await?;
        tx.commit().await?;
        Ok(CartView::new(entries))
    }

    /// Replace a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the cart has no line for the product.
    /// Returns `ShopError::OutOfStock` if `quantity` exceeds stock; the line
    /// is left unchanged.
    #[instrument(skip(self), fields(account_id = %account_id, product_id = %product_id))]
    pub async fn update(
        &self,
        account_id: AccountId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartView, ShopError> {
        let mut tx = self.store.begin().await?;

        if tx.cart_line(account_id, product_id).await?.is_none() {
            return Err(ShopError::NotFound("Cart item"));
        }
        let product = tx
            .product(product_id)
            .await?
            .ok_or(ShopError::NotFound("Product"))?;
        if !product.has_stock_for(quantity) {
            return Err(out_of_stock(&product));
        }

        tx.set_cart_quantity(account_id, product_id, quantity)
            .await?;

        let entries = tx.cart_entries(account_id).await?;
        tx.commit().await?;
        Ok(CartView::new(entries))
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the cart has no line for the product,
    /// including when it was already removed.
    #[instrument(skip(self), fields(account_id = %account_id, product_id = %product_id))]
    pub async fn remove(
        &self,
        account_id: AccountId,
        product_id: ProductId,
    ) -> Result<CartView, ShopError> {
        let mut tx = self.store.begin().await?;

        if !tx.delete_cart_line(account_id, product_id).await? {
            return Err(ShopError::NotFound("Cart item"));
        }

        let entries = tx.cart_entries(account_id).await?;
        tx.commit().await?;
        Ok(CartView::new(entries))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{Email, Price};

    use super::*;
    use crate::db::{AccountRepository, MemoryStore};
    use crate::models::NewProduct;

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    async fn setup(stock: i32) -> (MemoryStore, AccountId, Product) {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let account = tx
            .create_account(&Email::parse("cart@example.com").unwrap(), "hash")
            .await
            .unwrap();
        let product = tx
            .insert_product(&NewProduct {
                name: "Notebook".to_string(),
                description: None,
                price: Price::from_cents(1000),
                category: None,
                image_url: None,
                stock_quantity: stock,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (store, account.id, product)
    }

    #[tokio::test]
    async fn test_add_sums_quantities() {
        let (store, account, product) = setup(10).await;
        let cart = CartService::new(&store);

        cart.add(account, product.id, qty(2)).await.unwrap();
        let view = cart.add(account, product.id, qty(3)).await.unwrap();

        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.line_for(product.id).unwrap().quantity, qty(5));
        assert_eq!(view.total, Price::from_cents(5000));
    }

    #[tokio::test]
    async fn test_update_is_absolute() {
        let (store, account, product) = setup(10).await;
        let cart = CartService::new(&store);

        cart.add(account, product.id, qty(2)).await.unwrap();
        let view = cart.update(account, product.id, qty(5)).await.unwrap();

        assert_eq!(view.line_for(product.id).unwrap().quantity, qty(5));
    }

    #[tokio::test]
    async fn test_add_then_remove_leaves_no_line() {
        let (store, account, product) = setup(10).await;
        let cart = CartService::new(&store);

        cart.add(account, product.id, qty(2)).await.unwrap();
        let view = cart.remove(account, product.id).await.unwrap();
        assert!(view.is_empty());

        // A second remove is an explicit NotFound
        assert!(matches!(
            cart.remove(account, product.id).await,
            Err(ShopError::NotFound("Cart item"))
        ));
    }

    #[tokio::test]
    async fn test_update_beyond_stock_leaves_line_unchanged() {
        let (store, account, product) = setup(5).await;
        let cart = CartService::new(&store);

        cart.add(account, product.id, qty(2)).await.unwrap();
        let err = cart.update(account, product.id, qty(6)).await.unwrap_err();
        assert!(matches!(err, ShopError::OutOfStock { available: 5, .. }));

        let view = cart.view(account).await.unwrap();
        assert_eq!(view.line_for(product.id).unwrap().quantity, qty(2));
    }

    #[tokio::test]
    async fn test_add_beyond_stock_counts_existing_line() {
        let (store, account, product) = setup(5).await;
        let cart = CartService::new(&store);

        cart.add(account, product.id, qty(4)).await.unwrap();
        assert!(matches!(
            cart.add(account, product.id, qty(2)).await,
            Err(ShopError::OutOfStock { .. })
        ));

        let view = cart.view(account).await.unwrap();
        assert_eq!(view.line_for(product.id).unwrap().quantity, qty(4));
    }

    #[tokio::test]
    async fn test_add_inactive_or_missing_product_not_found() {
        let (store, account, product) = setup(5).await;
        let mut tx = store.begin().await.unwrap();
        tx.set_active(product.id, false).await.unwrap();
        tx.commit().await.unwrap();

        let cart = CartService::new(&store);
        assert!(matches!(
            cart.add(account, product.id, qty(1)).await,
            Err(ShopError::NotFound("Product"))
        ));
        assert!(matches!(
            cart.add(account, ProductId::new(), qty(1)).await,
            Err(ShopError::NotFound("Product"))
        ));
    }

    #[tokio::test]
    async fn test_update_without_line_not_found() {
        let (store, account, product) = setup(5).await;
        let cart = CartService::new(&store);
        assert!(matches!(
            cart.update(account, product.id, qty(1)).await,
            Err(ShopError::NotFound("Cart item"))
        ));
    }
}
