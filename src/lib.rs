//! Library exports for despesas, shared between the binary and tests.

pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod routes;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod upload;
pub mod utils;
