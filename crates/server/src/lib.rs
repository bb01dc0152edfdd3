//! Bazaar server library.
//!
//! The JSON API as a library, so the binary, the CLI and the integration
//! tests share one router, one schema and one set of services.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ServerConfig;
pub use state::AppState;
