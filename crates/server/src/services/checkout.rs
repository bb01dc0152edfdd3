//! Checkout orchestration.
//!
//! ```text
//! create_payment_intent     confirm_payment
//! (none) ──────────────► pending ──────────► completed   stock decremented, cart cleared
//!                           │
//!                           └──────────────► failed      cart untouched
//!
//! checkout (legacy): (none) ──► completed                no provider, no stock change
//! ```
//!
//! The provider is never called while a transaction is open. The window
//! between the stock check at intent creation and the decrement at
//! confirmation is not covered by a reservation; the decrement itself is
//! guarded so stock never goes negative.

use tracing::instrument;

use bazaar_core::{AccountId, CurrencyCode, OrderId, OrderStatus};

use super::ShopError;
use super::payment::{IntentRequest, IntentStatus, PaymentBridge, PaymentError};
use crate::db::{CartLedger, Catalog, OrderLedger, Store, Transaction};
use crate::models::{CartEntry, NewOrder, Order};

/// Result of a successful intent creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentCreated {
    /// Token the client passes to Stripe.js to complete payment.
    pub client_secret: String,
    /// The pending order recorded for this intent.
    pub order_id: OrderId,
}

/// Coordinates carts, catalog, orders and the payment provider.
#[derive(Clone, Debug)]
pub struct Checkout<S, P> {
    store: S,
    payments: P,
    currency: CurrencyCode,
}

impl<S: Store, P: PaymentBridge> Checkout<S, P> {
    #[must_use]
    pub const fn new(store: S, payments: P, currency: CurrencyCode) -> Self {
        Self {
            store,
            payments,
            currency,
        }
    }

    async fn cart_entries(&self, account_id: AccountId) -> Result<Vec<CartEntry>, ShopError> {
        let mut tx = self.store.begin().await?;
        let entries = tx.cart_entries(account_id).await?;
        tx.commit().await?;
        Ok(entries)
    }

    async fn order_for_reference(
        &self,
        account_id: AccountId,
        reference: &str,
    ) -> Result<Order, ShopError> {
        let mut tx = self.store.begin().await?;
        let order = tx.order_by_payment_reference(reference).await?;
        tx.commit().await?;

        // Another account's order is indistinguishable from a missing one
        order
            .filter(|o| o.account_id == account_id)
            .ok_or(ShopError::NotFound("Order"))
    }

    /// Start a payment for the account's cart.
    ///
    /// Re-checks stock, asks the provider for an intent, then records a
    /// `pending` order snapshotting the cart. Stock and cart are untouched.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::EmptyCart` if the cart has no lines.
    /// Returns `ShopError::OutOfStock` naming the first line that cannot be
    /// filled (short or deactivated).
    /// Returns `ShopError::PaymentProvider` if the provider call fails; no
    /// order is recorded.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn create_payment_intent(
        &self,
        account_id: AccountId,
    ) -> Result<IntentCreated, ShopError> {
        let entries = self.cart_entries(account_id).await?;
        if entries.is_empty() {
            return Err(ShopError::EmptyCart);
        }

        if let Some(short) = entries
            .iter()
            .find(|e| !e.product.is_active || !e.product.has_stock_for(e.line.quantity))
        {
            return Err(ShopError::OutOfStock {
                product: short.product.name.clone(),
                available: if short.product.is_active {
                    short.product.stock_quantity
                } else {
                    0
                },
            });
        }

        let draft = NewOrder::from_cart(account_id, &entries, OrderStatus::Pending, None)?;
        let request = IntentRequest {
            amount: draft.total_amount.to_minor_units()?,
            currency: self.currency,
            account_id,
        };

        let intent = self.payments.create_intent(&request).await?;
        let client_secret = intent.client_secret.ok_or_else(|| {
            PaymentError::Parse("payment intent has no client_secret".to_string())
        })?;

        let mut tx = self.store.begin().await?;
        let order = tx
            .insert_order(&NewOrder {
                payment_reference: Some(intent.id),
                ..draft
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            payment_reference = order.payment_reference.as_deref().unwrap_or_default(),
            total = %order.total_amount,
            "Pending order created"
        );

        Ok(IntentCreated {
            client_secret,
            order_id: order.id,
        })
    }

    /// Settle a pending order against the provider's authoritative status.
    ///
    /// On success the order becomes `completed`, stock is decremented per
    /// snapshot line, and the cart is cleared. Otherwise the order becomes
    /// `failed` and the cart is left for a retry.
    ///
    /// Calling this again for a completed order returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the account has no order with this
    /// payment reference.
    /// Returns `ShopError::PaymentFailed` if the provider reports anything
    /// but success, or the order already failed or was closed.
    /// Returns `ShopError::PaymentProvider` if the provider call fails.
    #[instrument(skip(self), fields(account_id = %account_id, payment_reference = %reference))]
    pub async fn confirm_payment(
        &self,
        account_id: AccountId,
        reference: &str,
    ) -> Result<Order, ShopError> {
        let order = self.order_for_reference(account_id, reference).await?;
        if order.status.is_terminal() {
            return settled(order);
        }

        let intent = self.payments.retrieve_intent(reference).await?;

        if intent.status != IntentStatus::Succeeded {
            let mut tx = self.store.begin().await?;
            if tx
                .transition_order(order.id, OrderStatus::Pending, OrderStatus::Failed)
                .await?
                .is_none()
            {
                // A concurrent confirmation settled the order first
                drop(tx);
                return settled(self.order_for_reference(account_id, reference).await?);
            }
            tx.commit().await?;

            tracing::warn!(order_id = %order.id, status = %intent.status, "Payment not successful");
            return Err(ShopError::PaymentFailed(format!(
                "payment status is {}",
                intent.status
            )));
        }

        let mut tx = self.store.begin().await?;
        let Some(completed) = tx
            .transition_order(order.id, OrderStatus::Pending, OrderStatus::Completed)
            .await?
        else {
            drop(tx);
            return settled(self.order_for_reference(account_id, reference).await?);
        };

        for item in &completed.items {
            if !tx.decrement_stock(item.product_id, item.quantity).await? {
                tracing::warn!(
                    order_id = %completed.id,
                    product_id = %item.product_id,
                    quantity = %item.quantity,
                    "Insufficient stock at confirmation, decrement skipped"
                );
            }
        }
        tx.clear_cart(account_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %completed.id, "Order completed");
        Ok(completed)
    }

    /// Legacy direct checkout: record a `completed` order and clear the cart.
    ///
    /// No provider call and no stock change.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::EmptyCart` if the cart has no lines.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn checkout(&self, account_id: AccountId) -> Result<Order, ShopError> {
        let mut tx = self.store.begin().await?;
        let entries = tx.cart_entries(account_id).await?;
        if entries.is_empty() {
            return Err(ShopError::EmptyCart);
        }

        let draft = NewOrder::from_cart(account_id, &entries, OrderStatus::Completed, None)?;
        let order = tx.insert_order(&draft).await?;
        tx.clear_cart(account_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, total = %order.total_amount, "Legacy checkout completed");
        Ok(order)
    }

    /// All of the account's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Repository` if the query fails.
    pub async fn list_orders(&self, account_id: AccountId) -> Result<Vec<Order>, ShopError> {
        let mut tx = self.store.begin().await?;
        let orders = tx.orders_for_account(account_id).await?;
        tx.commit().await?;
        Ok(orders)
    }

    /// One of the account's orders.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the account has no such order.
    pub async fn order(&self, account_id: AccountId, order_id: OrderId) -> Result<Order, ShopError> {
        let mut tx = self.store.begin().await?;
        let order = tx.order(order_id).await?;
        tx.commit().await?;
        order
            .filter(|o| o.account_id == account_id)
            .ok_or(ShopError::NotFound("Order"))
    }
}

/// Outcome of confirming an order that has already left `pending`.
fn settled(order: Order) -> Result<Order, ShopError> {
    match order.status {
        OrderStatus::Completed => Ok(order),
        other => Err(ShopError::PaymentFailed(format!("order is {other}"))),
    }
}
