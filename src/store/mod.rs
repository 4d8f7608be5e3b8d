pub mod base;
pub mod memory_store;
pub mod redis_store;

// Re-export the primary items so code outside can do
// "use crate::store::{SessionStore, create_store};"
pub use base::{create_store, SessionStore};
