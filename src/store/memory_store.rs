use async_trait::async_trait;
use dashmap::DashMap;

use super::SessionStore;
use crate::models::Session;

/// An in-process session store for development and tests. Expired
/// sessions are reaped lazily on lookup.
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            sessions: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, String> {
        if let Some(entry) = self.sessions.get(id) {
            if entry.is_expired() {
                drop(entry);
                self.sessions.remove(id);
                return Ok(None);
            }
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }

    async fn set(&self, session: &Session) -> Result<(), String> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), String> {
        self.sessions.remove(id);
        Ok(())
    }
}
