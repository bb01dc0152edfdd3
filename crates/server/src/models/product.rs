//! Product domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{Price, ProductId, Quantity};

/// Maximum length of a product name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length of a product category.
pub const MAX_CATEGORY_LENGTH: usize = 100;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// Units on hand. Never negative (guarded by a `CHECK` constraint and by
    /// every decrement).
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` units could be sold right now.
    #[must_use]
    pub fn has_stock_for(&self, quantity: Quantity) -> bool {
        i64::from(quantity.get()) <= i64::from(self.stock_quantity)
    }
}

/// A validated product ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub stock_quantity: i32,
}

/// Listing filter for the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Hide deactivated products.
    pub active_only: bool,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category: None,
            active_only: true,
        }
    }
}

impl ProductFilter {
    /// Whether `product` passes this filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if self.active_only && !product.is_active {
            return false;
        }
        self.category
            .as_deref()
            .is_none_or(|category| product.category.as_deref() == Some(category))
    }
}
