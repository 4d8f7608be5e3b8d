use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::{memory_store::MemoryStore, redis_store::RedisStore};
use crate::config::StoreConfig;
use crate::models::Session;

/// The SessionStore trait abstracts session persistence (get, set,
/// destroy). The backing store must provide atomic read/write per
/// session key; both backends here do.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session by id. `Ok(None)` means no such session.
    async fn get(&self, id: &str) -> Result<Option<Session>, String>;

    /// Persist a session. The write must be complete when this
    /// returns: callers rely on a follow-up request served by another
    /// replica seeing the session.
    async fn set(&self, session: &Session) -> Result<(), String>;

    /// Remove a session. Destroying a missing session succeeds.
    async fn destroy(&self, id: &str) -> Result<(), String>;
}

/// Creates a concrete store implementation based on the StoreConfig.
pub async fn create_store(config: &StoreConfig) -> Arc<dyn SessionStore> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory session store (single-instance only).");
            Arc::new(MemoryStore::new())
        }
        StoreConfig::Redis(redis_config) => match RedisStore::new(redis_config).await {
            Ok(store) => {
                info!("Successfully connected to Redis session store.");
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to create Redis session store: {}", e);
                std::process::exit(1);
            }
        },
    }
}
