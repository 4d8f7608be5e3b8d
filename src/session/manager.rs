use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::{Profile, Session, TokenSet};
use crate::provider::{IdentityProvider, ProviderError};
use crate::store::SessionStore;

/// Orchestrates the per-session token lifecycle:
/// login-initiation, callback handling, refresh-on-invalid, logout.
///
/// State machine per session:
/// Anonymous -> Authenticating -> Authenticated -> (Refreshing)
///   -> Authenticated | Expired.
/// Anonymous and Authenticating have no store record; Expired means
/// the record was destroyed and the user must log in again.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    ttl_hours: i64,
    /// Single-flight locks for token refresh, keyed by session id.
    refresh_flights: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
        ttl_hours: i64,
    ) -> Self {
        SessionManager {
            provider,
            store,
            ttl_hours,
            refresh_flights: DashMap::new(),
        }
    }

    /// The callback path every login round trip goes through. The same
    /// value must be used byte-for-byte when building the authorization
    /// URL and when exchanging the code, or the provider rejects the
    /// exchange.
    fn redirect_uri(origin: &str) -> String {
        format!("{}/auth/callback", origin.trim_end_matches('/'))
    }

    /// Builds the provider authorization URL for a login initiated from
    /// the given request origin. Pure: no session is created yet.
    pub fn begin_login(&self, origin: &str) -> String {
        self.provider.authorization_url(&Self::redirect_uri(origin))
    }

    /// Exchanges the authorization code and creates the session. The
    /// store write is awaited before returning so that a client whose
    /// next request lands on another replica already sees itself as
    /// logged in.
    pub async fn complete_login(&self, code: &str, origin: &str) -> Result<Session, AppError> {
        let tokens = self
            .provider
            .exchange_code(code, &Self::redirect_uri(origin))
            .await
            .map_err(|e| AppError::AuthExchange(e.to_string()))?;

        // Cache the display name up front. A userinfo failure here is
        // not fatal: the tokens are valid, the name can be fetched later.
        let user_name = match self.provider.fetch_profile(&tokens).await {
            Ok(profile) => Some(profile.name),
            Err(e) => {
                warn!("Could not fetch profile at login: {}", e);
                None
            }
        };

        let session = Session::new(tokens, user_name, self.ttl_hours);
        self.store.set(&session).await.map_err(AppError::Store)?;

        info!("Session '{}' created", session.id);
        Ok(session)
    }

    /// Loads a session and enforces passive expiry. Missing or expired
    /// sessions are Unauthenticated.
    async fn load_valid(&self, session_id: &str) -> Result<Session, AppError> {
        let session = self
            .store
            .get(session_id)
            .await
            .map_err(AppError::Store)?
            .ok_or(AppError::Unauthenticated)?;

        if session.is_expired() {
            debug!("Session '{}' past its TTL, destroying", session_id);
            self.store.destroy(session_id).await.map_err(AppError::Store)?;
            return Err(AppError::Unauthenticated);
        }

        Ok(session)
    }

    /// Returns the authenticated user's profile, applying the
    /// refresh-on-invalid policy: on the first token rejection, attempt
    /// exactly one refresh and retry the profile fetch once.
    pub async fn current_user(&self, session_id: &str) -> Result<Profile, AppError> {
        let mut session = self.load_valid(session_id).await?;

        // Never use an access token past its expiry without refreshing.
        if session.tokens.is_expired() {
            session = self.refresh_session(session).await?;
        }

        let profile = match self.provider.fetch_profile(&session.tokens).await {
            Ok(profile) => profile,
            Err(ProviderError::TokenInvalid) => {
                debug!("Access token rejected for session '{}', refreshing", session.id);
                let session = self.refresh_session(session).await?;
                self.provider
                    .fetch_profile(&session.tokens)
                    .await
                    .map_err(|e| self.map_profile_error(e))?
            }
            Err(e) => return Err(self.map_profile_error(e)),
        };

        Ok(profile)
    }

    /// Shared precondition for operations that call external APIs on
    /// the user's behalf: a live session with a usable access token.
    /// Refreshes proactively when the token is past its expiry.
    pub async fn authorized_tokens(&self, session_id: &str) -> Result<TokenSet, AppError> {
        let session = self.load_valid(session_id).await?;

        if session.tokens.is_expired() {
            let session = self.refresh_session(session).await?;
            return Ok(session.tokens);
        }

        Ok(session.tokens)
    }

    /// Unconditionally destroys the session record. Idempotent: logging
    /// out an already-destroyed session succeeds.
    pub async fn logout(&self, session_id: &str) -> Result<(), AppError> {
        self.store.destroy(session_id).await.map_err(AppError::Store)?;
        info!("Session '{}' destroyed", session_id);
        Ok(())
    }

    /// Performs one refresh under the per-session single-flight lock
    /// and persists the result before returning. A caller that waited
    /// on the lock re-reads the session and skips its own refresh when
    /// another flight already renewed the tokens.
    ///
    /// On a rejected refresh token the session record is destroyed:
    /// the caller must re-authenticate from scratch. On a transport
    /// failure the record is left untouched.
    async fn refresh_session(&self, session: Session) -> Result<Session, AppError> {
        let flight = self
            .refresh_flights
            .entry(session.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = flight.lock().await;

        let result = self.refresh_locked(&session).await;

        // A request arriving after this point creates a fresh lock and
        // observes the refreshed (or destroyed) session on its re-read.
        drop(guard);
        self.refresh_flights.remove(&session.id);

        result
    }

    async fn refresh_locked(&self, session: &Session) -> Result<Session, AppError> {
        // Re-read under the lock: a concurrent flight may have already
        // refreshed and persisted new tokens.
        let current = self.load_valid(&session.id).await?;
        if current.tokens.access_token != session.tokens.access_token
            && !current.tokens.is_expired()
        {
            debug!("Session '{}' already refreshed by a concurrent request", session.id);
            return Ok(current);
        }

        match self.provider.refresh(&current.tokens).await {
            Ok(tokens) => {
                let mut updated = current;
                updated.tokens = tokens;
                self.store.set(&updated).await.map_err(AppError::Store)?;
                info!("Session '{}' tokens refreshed", updated.id);
                Ok(updated)
            }
            Err(ProviderError::RefreshFailed(e)) => {
                warn!("Refresh failed for session '{}', destroying: {}", session.id, e);
                self.store.destroy(&session.id).await.map_err(AppError::Store)?;
                Err(AppError::Unauthenticated)
            }
            Err(e) => Err(AppError::Provider(e.to_string())),
        }
    }

    fn map_profile_error(&self, e: ProviderError) -> AppError {
        match e {
            // A second rejection right after a successful refresh: give
            // up and require a fresh login, but keep the session record
            // (the refreshed tokens may still serve other calls).
            ProviderError::TokenInvalid => AppError::Unauthenticated,
            other => AppError::Provider(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenSet;
    use crate::store::memory_store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A scriptable provider: counts calls and serves canned results.
    struct FakeProvider {
        /// Access tokens considered valid by fetch_profile.
        valid_tokens: Vec<String>,
        /// Result of a refresh call, or None to reject the refresh.
        refreshed: Option<TokenSet>,
        refresh_calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(valid_tokens: &[&str], refreshed: Option<TokenSet>) -> Self {
            FakeProvider {
                valid_tokens: valid_tokens.iter().map(|t| t.to_string()).collect(),
                refreshed,
                refresh_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn authorization_url(&self, redirect_uri: &str) -> String {
            format!("https://provider.test/auth?redirect_uri={}", redirect_uri)
        }

        async fn exchange_code(
            &self,
            code: &str,
            _redirect_uri: &str,
        ) -> Result<TokenSet, ProviderError> {
            if code == "abc123" {
                Ok(fresh_tokens("A1", Some("R1")))
            } else {
                Err(ProviderError::Exchange("invalid code".to_string()))
            }
        }

        async fn fetch_profile(&self, tokens: &TokenSet) -> Result<Profile, ProviderError> {
            if self.valid_tokens.contains(&tokens.access_token) {
                Ok(Profile {
                    name: "Ana Silva".to_string(),
                })
            } else {
                Err(ProviderError::TokenInvalid)
            }
        }

        async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, ProviderError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            match &self.refreshed {
                Some(new_tokens) => {
                    let mut t = new_tokens.clone();
                    if t.refresh_token.is_none() {
                        t.refresh_token = tokens.refresh_token.clone();
                    }
                    Ok(t)
                }
                None => Err(ProviderError::RefreshFailed("invalid_grant".to_string())),
            }
        }
    }

    fn fresh_tokens(access: &str, refresh: Option<&str>) -> TokenSet {
        TokenSet {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Utc::now().timestamp() + 3600,
        }
    }

    fn manager(provider: FakeProvider) -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(Arc::new(provider), store.clone(), 24);
        (manager, store)
    }

    /// completeLogin followed immediately by currentUser sees the
    /// authenticated profile: the store write happens before the
    /// login call returns.
    #[tokio::test]
    async fn test_login_then_current_user() {
        let (manager, _) = manager(FakeProvider::new(&["A1"], None));

        let session = manager
            .complete_login("abc123", "http://localhost:3000")
            .await
            .expect("login should succeed");
        assert_eq!(session.user_name.as_deref(), Some("Ana Silva"));

        let profile = manager
            .current_user(&session.id)
            .await
            .expect("current_user should succeed");
        assert_eq!(profile.name, "Ana Silva");
    }

    /// A bad authorization code surfaces as AuthExchange.
    #[tokio::test]
    async fn test_login_with_bad_code() {
        let (manager, _) = manager(FakeProvider::new(&["A1"], None));
        let result = manager.complete_login("wrong", "http://localhost:3000").await;
        assert!(matches!(result, Err(AppError::AuthExchange(_))));
    }

    /// Unknown sessions are Unauthenticated, not errors.
    #[tokio::test]
    async fn test_current_user_without_session() {
        let (manager, _) = manager(FakeProvider::new(&["A1"], None));
        let result = manager.current_user("no-such-session").await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));
    }

    /// Access token rejected, refresh token valid: currentUser succeeds
    /// transparently after one refresh and the stored tokens are updated.
    #[tokio::test]
    async fn test_refresh_on_invalid() {
        let provider = FakeProvider::new(&["A2"], Some(fresh_tokens("A2", None)));
        let (manager, store) = manager(provider);

        let session = manager
            .complete_login("abc123", "http://localhost:3000")
            .await
            .expect("login should succeed");

        let profile = manager
            .current_user(&session.id)
            .await
            .expect("current_user should refresh transparently");
        assert_eq!(profile.name, "Ana Silva");

        let stored = store
            .get(&session.id)
            .await
            .expect("get should succeed")
            .expect("session should still exist");
        assert_eq!(stored.tokens.access_token, "A2");
        // The provider omitted a refresh_token; the old one is retained.
        assert_eq!(stored.tokens.refresh_token.as_deref(), Some("R1"));
    }

    /// Access token rejected and refresh rejected: the session is
    /// destroyed and the caller sees Unauthenticated.
    #[tokio::test]
    async fn test_refresh_failure_destroys_session() {
        let provider = FakeProvider::new(&[], None);
        let (manager, store) = manager(provider);

        let session = manager
            .complete_login("abc123", "http://localhost:3000")
            .await
            .expect("login should succeed");
        // complete_login tolerates the failed profile fetch.
        assert_eq!(session.user_name, None);

        let result = manager.current_user(&session.id).await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));

        let stored = store.get(&session.id).await.expect("get should succeed");
        assert_eq!(stored, None, "session record should be destroyed");
    }

    /// An access token past its expiry is refreshed before use, even
    /// when the provider would still accept it.
    #[tokio::test]
    async fn test_proactive_refresh_of_expired_token() {
        let provider = FakeProvider::new(&["A1", "A2"], Some(fresh_tokens("A2", None)));
        let (manager, store) = manager(provider);

        let session = manager
            .complete_login("abc123", "http://localhost:3000")
            .await
            .expect("login should succeed");

        // Force the access token past its expiry.
        let mut stale = store
            .get(&session.id)
            .await
            .expect("get should succeed")
            .expect("session should exist");
        stale.tokens.expires_at = Utc::now().timestamp() - 1;
        store.set(&stale).await.expect("set should succeed");

        let tokens = manager
            .authorized_tokens(&session.id)
            .await
            .expect("authorized_tokens should refresh");
        assert_eq!(tokens.access_token, "A2");
    }

    /// Concurrent refreshes on the same session are serialized: both
    /// callers succeed but the provider's refresh endpoint is only hit
    /// once; the second flight observes the first one's tokens.
    #[tokio::test]
    async fn test_single_flight_refresh() {
        let provider = Arc::new(FakeProvider::new(&["A2"], Some(fresh_tokens("A2", None))));
        let store = Arc::new(MemoryStore::new());
        let manager = Arc::new(SessionManager::new(provider.clone(), store, 24));

        let session = manager
            .complete_login("abc123", "http://localhost:3000")
            .await
            .expect("login should succeed");

        let a = {
            let m = manager.clone();
            let id = session.id.clone();
            tokio::spawn(async move { m.current_user(&id).await })
        };
        let b = {
            let m = manager.clone();
            let id = session.id.clone();
            tokio::spawn(async move { m.current_user(&id).await })
        };

        let (ra, rb) = (a.await.expect("task a"), b.await.expect("task b"));
        assert!(ra.is_ok() && rb.is_ok(), "both callers should succeed");
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
    }

    /// The refresh endpoint is hit exactly once for a single
    /// refresh-on-invalid sequence.
    #[tokio::test]
    async fn test_refresh_call_count() {
        let provider = Arc::new(FakeProvider::new(&["A2"], Some(fresh_tokens("A2", None))));
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(provider.clone(), store, 24);

        let session = manager
            .complete_login("abc123", "http://localhost:3000")
            .await
            .expect("login should succeed");

        manager
            .current_user(&session.id)
            .await
            .expect("current_user should succeed");

        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
    }

    /// Logging out twice in a row is safe.
    #[tokio::test]
    async fn test_logout_idempotent() {
        let (manager, store) = manager(FakeProvider::new(&["A1"], None));

        let session = manager
            .complete_login("abc123", "http://localhost:3000")
            .await
            .expect("login should succeed");

        manager.logout(&session.id).await.expect("logout should succeed");
        assert_eq!(store.get(&session.id).await.expect("get should succeed"), None);
        manager
            .logout(&session.id)
            .await
            .expect("second logout should succeed");
    }

    /// begin_login reuses the exact redirect URI in the authorization
    /// URL, derived from the request origin.
    #[tokio::test]
    async fn test_begin_login_redirect_uri() {
        let (manager, _) = manager(FakeProvider::new(&["A1"], None));
        let url = manager.begin_login("https://despesas.example.com/");
        assert!(url.contains("redirect_uri=https://despesas.example.com/auth/callback"));
    }
}
