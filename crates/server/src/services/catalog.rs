//! Catalog service: listing, lookup, creation and deactivation of products.

use tracing::instrument;

use bazaar_core::{Price, ProductId};

use super::ShopError;
use crate::db::{Catalog, Store, Transaction};
use crate::models::product::{MAX_CATEGORY_LENGTH, MAX_NAME_LENGTH};
use crate::models::{NewProduct, Product, ProductFilter};

/// Unvalidated product fields as submitted by a client.
///
/// Both the JSON and multipart endpoints funnel into this type, so numbers
/// arrive as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub stock_quantity: Option<String>,
    pub image_url: Option<String>,
}

impl ProductInput {
    /// Validate into a product ready for insertion.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::InvalidArgument` naming the first invalid field.
    pub fn validate(self) -> Result<NewProduct, ShopError> {
        let name = non_blank(self.name)
            .ok_or_else(|| ShopError::InvalidArgument("Product name and price are required".into()))?;
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ShopError::InvalidArgument(format!(
                "name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }

        let price = non_blank(self.price)
            .ok_or_else(|| ShopError::InvalidArgument("Product name and price are required".into()))?;
        let price = Price::parse_listing(&price)?;

        let category = non_blank(self.category);
        if category
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_CATEGORY_LENGTH)
        {
            return Err(ShopError::InvalidArgument(format!(
                "category must be at most {MAX_CATEGORY_LENGTH} characters"
            )));
        }

        let stock_quantity = match non_blank(self.stock_quantity) {
            None => 0,
            Some(raw) => raw
                .parse::<i32>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| {
                    ShopError::InvalidArgument("stock_quantity must be a non-negative integer".into())
                })?,
        };

        Ok(NewProduct {
            name,
            description: non_blank(self.description),
            price,
            category,
            image_url: non_blank(self.image_url),
            stock_quantity,
        })
    }
}

/// Trim a field, treating blank as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Catalog service.
pub struct CatalogService<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> CatalogService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// List products matching a filter.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Repository` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, ShopError> {
        let mut tx = self.store.begin().await?;
        let products = tx.list_products(filter).await?;
        tx.commit().await?;
        Ok(products)
    }

    /// Get one product, active or not.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if no product has this ID.
    pub async fn get(&self, id: ProductId) -> Result<Product, ShopError> {
        let mut tx = self.store.begin().await?;
        let product = tx.product(id).await?.ok_or(ShopError::NotFound("Product"))?;
        tx.commit().await?;
        Ok(product)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Repository` if the insert fails.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create(&self, product: &NewProduct) -> Result<Product, ShopError> {
        let mut tx = self.store.begin().await?;
        let product = tx.insert_product(product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Withdraw a product from sale. It stays referenced by carts and orders.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if no product has this ID.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn deactivate(&self, id: ProductId) -> Result<Product, ShopError> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .set_active(id, false)
            .await?
            .ok_or(ShopError::NotFound("Product"))?;
        tx.commit().await?;
        Ok(product)
    }
}
