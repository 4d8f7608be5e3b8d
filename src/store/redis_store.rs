use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SessionStore;
use crate::models::Session;

/// The config struct for Redis connections.
#[derive(Deserialize, Serialize, JsonSchema, Debug)]
pub struct RedisConfig {
    pub url: String,
}

/// A `SessionStore` backed by a shared Redis instance, for deployments
/// with more than one server process. Sessions are written with a TTL
/// so Redis expires them server-side.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, String> {
        info!("Connecting to Redis session store");

        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| format!("Failed to parse Redis URL: {}", e))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| format!("Failed to connect to Redis: {}", e))?;

        Ok(Self { conn })
    }

    fn key(id: &str) -> String {
        format!("session:{}", id)
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, String> {
        let raw: Option<String> = self
            .conn
            .clone()
            .get(Self::key(id))
            .await
            .map_err(|e| format!("Redis GET failed: {}", e))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let session: Session = serde_json::from_str(&raw)
            .map_err(|e| format!("Corrupt session record for '{}': {}", id, e))?;

        // The Redis TTL should have expired this already; the check
        // covers clock skew between writer and reader.
        if session.is_expired() {
            debug!("Session '{}' expired, removing", id);
            self.destroy(id).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn set(&self, session: &Session) -> Result<(), String> {
        let ttl = session.expires_at - Utc::now().timestamp();
        if ttl <= 0 {
            return Err(format!("Refusing to store already-expired session '{}'", session.id));
        }

        let raw = serde_json::to_string(session)
            .map_err(|e| format!("Failed to serialize session: {}", e))?;

        let _: () = self
            .conn
            .clone()
            .set_ex(Self::key(&session.id), raw, ttl as u64)
            .await
            .map_err(|e| format!("Redis SETEX failed: {}", e))?;

        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), String> {
        let _: () = self
            .conn
            .clone()
            .del(Self::key(id))
            .await
            .map_err(|e| format!("Redis DEL failed: {}", e))?;

        Ok(())
    }
}
