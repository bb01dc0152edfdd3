//! Business logic services.
//!
//! Each service runs one operation per [`Store`](crate::db::Store)
//! transaction. The payment bridge is only ever called with no transaction
//! open.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
mod error;
pub mod payment;
pub mod uploads;

pub use auth::{AuthError, AuthService, AuthSession};
pub use cart::CartService;
pub use catalog::{CatalogService, ProductInput};
pub use checkout::{Checkout, IntentCreated};
pub use error::ShopError;
pub use payment::{IntentRequest, IntentStatus, PaymentBridge, PaymentError, PaymentIntent, StripeBridge};
#[cfg(any(test, feature = "test-support"))]
pub use payment::ScriptedPayments;
pub use uploads::{ImageStore, UploadError};
