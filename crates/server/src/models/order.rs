//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{AccountId, OrderId, OrderStatus, Price, PriceError, ProductId, Quantity};

use super::CartEntry;

/// One purchased line, captured when the order is created.
///
/// Stored as part of the order's JSONB `items` column and never rewritten,
/// so later price or name changes on the product do not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: Quantity,
    pub line_total: Price,
}

impl LineItem {
    /// Snapshot a cart entry at its current price.
    #[must_use]
    pub fn capture(entry: &CartEntry) -> Self {
        Self {
            product_id: entry.product.id,
            name: entry.product.name.clone(),
            unit_price: entry.product.price,
            quantity: entry.line.quantity,
            line_total: entry.line_total(),
        }
    }
}

/// A purchase attempt and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub total_amount: Price,
    pub status: OrderStatus,
    /// Stripe `PaymentIntent` id; `None` for legacy direct checkouts.
    pub payment_reference: Option<String>,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub account_id: AccountId,
    pub status: OrderStatus,
    pub payment_reference: Option<String>,
    pub items: Vec<LineItem>,
    pub total_amount: Price,
}

impl NewOrder {
    /// Snapshot a cart into a new order.
    ///
    /// `total_amount` is the sum of the captured line totals.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::TooLarge` if the total exceeds what the order
    /// ledger can store.
    pub fn from_cart(
        account_id: AccountId,
        entries: &[CartEntry],
        status: OrderStatus,
        payment_reference: Option<String>,
    ) -> Result<Self, PriceError> {
        let items: Vec<LineItem> = entries.iter().map(LineItem::capture).collect();
        let total_amount = items
            .iter()
            .map(|item| item.line_total)
            .sum::<Price>()
            .order_total()?;
        Ok(Self {
            account_id,
            status,
            payment_reference,
            items,
            total_amount,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::CartLineId;

    use super::*;
    use crate::models::{CartLine, Product};

    #[test]
    fn test_snapshot_total_matches_lines() {
        let now = Utc::now();
        let account_id = AccountId::new();
        let product = Product {
            id: ProductId::new(),
            name: "Lamp".to_string(),
            description: Some("Brass".to_string()),
            price: Price::from_cents(1000),
            category: None,
            image_url: None,
            is_active: true,
            stock_quantity: 5,
            created_at: now,
            updated_at: now,
        };
        let entry = CartEntry {
            line: CartLine {
                id: CartLineId::new(),
                account_id,
                product_id: product.id,
                quantity: Quantity::new(2).unwrap(),
                added_at: now,
                updated_at: now,
            },
            product,
        };

        let order = NewOrder::from_cart(account_id, &[entry], OrderStatus::Pending, None).unwrap();

        assert_eq!(order.total_amount, Price::from_cents(2000));
        assert_eq!(order.items.len(), 1);
        let item = order.items.first().unwrap();
        assert_eq!(item.name, "Lamp");
        assert_eq!(item.unit_price, Price::from_cents(1000));
    }

    #[test]
    fn test_line_item_json_shape() {
        let item = LineItem {
            product_id: ProductId::new(),
            name: "Lamp".to_string(),
            unit_price: Price::from_cents(1000),
            quantity: Quantity::new(2).unwrap(),
            line_total: Price::from_cents(2000),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["unit_price"], "10.00");
        assert_eq!(json["quantity"], 2);

        let back: LineItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
