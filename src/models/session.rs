use axum::async_trait;
use axum::extract::FromRequestParts;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::state::AppState;

/// Name of the client-side session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Access/refresh credential pair issued by the identity provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp after which the access token must not be used
    /// without a refresh attempt first.
    pub expires_at: i64,
}

impl TokenSet {
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at
    }
}

/// Server-side record linking a client's cookie to a TokenSet.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub created_at: i64,
    pub expires_at: i64,
    /// Display name cached from the provider's userinfo response, so
    /// `/api/user` does not need a provider round trip on every call.
    pub user_name: Option<String>,
    pub tokens: TokenSet,
}

impl Session {
    /// Create a new Session with a fresh opaque id and the given TTL.
    pub fn new(tokens: TokenSet, user_name: Option<String>, ttl_hours: i64) -> Self {
        let now = Utc::now().timestamp();
        Session {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            expires_at: now + ttl_hours * 3600,
            user_name,
            tokens,
        }
    }

    /// Passive expiry: sessions older than the configured TTL are dead
    /// regardless of token state.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at
    }

    /// Convert the session id into a signed cookie value (compact JWT),
    /// so a tampered cookie is rejected before any store lookup.
    pub fn to_cookie_value(&self, secret: &str) -> String {
        let claims = CookieClaims {
            sub: self.id.clone(),
            iat: self.created_at,
            exp: self.expires_at,
        };
        let encoding_key = EncodingKey::from_secret(secret.as_ref());
        encode(&Header::default(), &claims, &encoding_key).expect("Failed to encode session cookie")
    }

    /// Recover the session id from a signed cookie value. Returns None
    /// for missing signatures, bad signatures, or expired cookies.
    pub fn id_from_cookie_value(value: &str, secret: &str) -> Option<String> {
        let mut validation = Validation::default();
        validation.validate_aud = false;
        let decoding_key = DecodingKey::from_secret(secret.as_ref());
        match decode::<CookieClaims>(value, &decoding_key, &validation) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                debug!("Rejected session cookie: {}", e);
                None
            }
        }
    }
}

/// Claims carried by the signed session cookie.
#[derive(Serialize, Deserialize, Debug)]
struct CookieClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Extractor producing the session id carried by the request, if any.
///
/// Never rejects: handlers decide what an absent session means for
/// their endpoint (401 envelope vs. `{"loggedIn": false}`).
#[derive(Debug, Clone)]
pub struct SessionId(pub Option<String>);

#[async_trait]
impl FromRequestParts<AppState> for SessionId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<SessionId, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .expect("CookieJar extraction is infallible");

        let id = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| Session::id_from_cookie_value(cookie.value(), &state.config.session.secret));

        Ok(SessionId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_set() -> TokenSet {
        TokenSet {
            access_token: "A1".to_string(),
            refresh_token: Some("R1".to_string()),
            expires_at: Utc::now().timestamp() + 3600,
        }
    }

    /// A freshly created session round-trips through its signed cookie.
    #[test]
    fn test_cookie_roundtrip() {
        let session = Session::new(token_set(), Some("Ana Silva".to_string()), 24);
        let value = session.to_cookie_value("secret");
        let id = Session::id_from_cookie_value(&value, "secret");
        assert_eq!(id, Some(session.id));
    }

    /// A cookie signed with a different secret is rejected.
    #[test]
    fn test_cookie_bad_signature() {
        let session = Session::new(token_set(), None, 24);
        let value = session.to_cookie_value("secret");
        assert_eq!(Session::id_from_cookie_value(&value, "other-secret"), None);
    }

    /// Garbage cookie values are rejected rather than panicking.
    #[test]
    fn test_cookie_garbage_value() {
        assert_eq!(Session::id_from_cookie_value("not-a-jwt", "secret"), None);
    }

    /// Sessions created with a 24h TTL are not expired immediately.
    #[test]
    fn test_fresh_session_not_expired() {
        let session = Session::new(token_set(), None, 24);
        assert!(!session.is_expired());
        assert!(!session.tokens.is_expired());
    }
}
