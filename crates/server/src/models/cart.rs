//! Cart domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{AccountId, CartLineId, Price, ProductId, Quantity};

use super::Product;

/// One `(account, product)` line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub account_id: AccountId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with its product as it is right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    pub line: CartLine,
    pub product: Product,
}

impl CartEntry {
    /// `quantity × current price`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.line.quantity.get())
    }
}

/// A whole cart with its live total.
///
/// The total is recomputed from current product prices every time a view
/// is built; only orders snapshot prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub entries: Vec<CartEntry>,
    pub total: Price,
}

impl CartView {
    /// Build a view, computing the total.
    #[must_use]
    pub fn new(entries: Vec<CartEntry>) -> Self {
        let total = entries.iter().map(CartEntry::line_total).sum();
        Self { entries, total }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line_for(&self, product_id: ProductId) -> Option<&CartLine> {
        self.entries
            .iter()
            .map(|entry| &entry.line)
            .find(|line| line.product_id == product_id)
    }
}
