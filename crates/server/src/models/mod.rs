//! Domain models for the shop.
//!
//! These are validated value objects returned by the ledgers in
//! [`crate::db`]. They never perform I/O; relationships are resolved by
//! explicit joins in the repository layer.

pub mod account;
pub mod cart;
pub mod order;
pub mod product;

pub use account::Account;
pub use cart::{CartEntry, CartLine, CartView};
pub use order::{LineItem, NewOrder, Order};
pub use product::{NewProduct, Product, ProductFilter};
