//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::{
    AuthService, CartService, CatalogService, Checkout, ImageStore, PaymentBridge,
};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Generic over the store and payment provider
/// so the same router serves `PostgreSQL` + Stripe in production and the
/// in-memory doubles in tests.
pub struct AppState<S, P> {
    inner: Arc<AppStateInner<S, P>>,
}

struct AppStateInner<S, P> {
    store: S,
    checkout: Checkout<S, P>,
    images: ImageStore,
    token_ttl: chrono::Duration,
}

impl<S, P> Clone for AppState<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store, P: PaymentBridge> AppState<S, P> {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: &ServerConfig, store: S, payments: P) -> Self {
        let checkout = Checkout::new(store.clone(), payments, config.payment.currency);
        Self {
            inner: Arc::new(AppStateInner {
                store,
                checkout,
                images: ImageStore::new(&config.uploads),
                token_ttl: config.token_ttl,
            }),
        }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_, S> {
        AuthService::new(&self.inner.store, self.inner.token_ttl)
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_, S> {
        CatalogService::new(&self.inner.store)
    }

    #[must_use]
    pub fn cart(&self) -> CartService<'_, S> {
        CartService::new(&self.inner.store)
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout<S, P> {
        &self.inner.checkout
    }

    /// Get a reference to the product image store.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.inner.images
    }
}
