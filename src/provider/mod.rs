pub mod oidc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Profile, TokenSet};

/// Failures at the identity-provider boundary. These never cross the
/// HTTP surface directly; the session manager translates them.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The authorization code exchange was rejected (invalid/expired
    /// code, mismatched redirect URI) or timed out.
    #[error("code exchange failed: {0}")]
    Exchange(String),
    /// The provider rejected the access token (expired or revoked).
    /// Potentially recoverable by a refresh.
    #[error("access token rejected by provider")]
    TokenInvalid,
    /// The refresh token itself was rejected or is absent. Terminal for
    /// the session: the user must re-authenticate from scratch.
    #[error("token refresh rejected: {0}")]
    RefreshFailed(String),
    /// Network-level failure. The session must be left untouched.
    #[error("provider request failed: {0}")]
    Transport(String),
}

/// Wraps the external identity/authorization service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Builds the provider authorization URL for the given redirect URI.
    /// Deterministic given client id, redirect URI and scope set.
    fn authorization_url(&self, redirect_uri: &str) -> String;

    /// Exchanges an authorization code for a TokenSet. The redirect URI
    /// must be byte-identical to the one used in `authorization_url`.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, ProviderError>;

    /// Fetches profile info using the access token.
    async fn fetch_profile(&self, tokens: &TokenSet) -> Result<Profile, ProviderError>;

    /// Exchanges the refresh token for a new access token. The previous
    /// refresh token is retained when the provider omits a new one.
    async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, ProviderError>;
}
