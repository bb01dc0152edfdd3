//! Shop operation errors.

use thiserror::Error;

use bazaar_core::{PriceError, QuantityError};

use super::payment::PaymentError;
use crate::db::RepositoryError;

/// Errors from catalog, cart and checkout operations.
#[derive(Debug, Error)]
pub enum ShopError {
    /// Malformed or missing input.
    #[error("{0}")]
    InvalidArgument(String),

    /// Missing product, cart line or order.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Requested more units than are on hand, or the product was withdrawn.
    #[error("insufficient stock for {product} ({available} available)")]
    OutOfStock { product: String, available: i32 },

    /// Checkout attempted with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The payment provider could not be reached or rejected the call.
    #[error("payment provider error: {0}")]
    PaymentProvider(#[from] PaymentError),

    /// The payment provider reported the payment did not succeed.
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<QuantityError> for ShopError {
    fn from(e: QuantityError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<PriceError> for ShopError {
    fn from(e: PriceError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}
