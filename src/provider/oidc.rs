use async_trait::async_trait;
use chrono::Utc;
use reqwest::{StatusCode, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{IdentityProvider, ProviderError};
use crate::models::{Profile, TokenSet};

fn default_timeout_secs() -> u64 {
    15
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/drive.file".to_string(),
        "https://www.googleapis.com/auth/userinfo.profile".to_string(),
    ]
}

/// Config for an OAuth2/OIDC identity provider. All endpoint URIs are
/// explicit so tests can point the client at a mock server.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct OidcProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub userinfo_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// A provider speaking the standard authorization-code flow over HTTP.
pub struct OidcProvider {
    config: OidcProviderConfig,
    client: reqwest::Client,
}

impl OidcProvider {
    pub fn new(config: &OidcProviderConfig) -> Self {
        info!(
            "Creating OidcProvider for client_id='{}', token_uri='{}'",
            config.client_id, config.token_uri
        );

        // One client, one timeout: every provider call is bounded so a
        // hung provider cannot hang the request indefinitely.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            config: config.clone(),
            client,
        }
    }

    /// Converts a token-endpoint JSON body into a TokenSet.
    /// `previous_refresh` is retained when the response omits a
    /// refresh_token, which providers do on refresh grants.
    fn token_set_from_response(
        body: &Value,
        previous_refresh: Option<&str>,
    ) -> Result<TokenSet, String> {
        let access_token = body
            .get("access_token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| "No access_token in token response".to_string())?
            .to_string();

        let expires_in = body.get("expires_in").and_then(|e| e.as_i64()).unwrap_or(3600);

        let refresh_token = body
            .get("refresh_token")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .or_else(|| previous_refresh.map(str::to_string));

        Ok(TokenSet {
            access_token,
            refresh_token,
            expires_at: Utc::now().timestamp() + expires_in,
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorization_url(&self, redirect_uri: &str) -> String {
        // access_type=offline + prompt=consent force the provider to
        // issue a refresh_token on every login.
        let url = Url::parse_with_params(
            &self.config.auth_uri,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", &self.config.scopes.join(" ")),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .expect("Invalid auth_uri in provider config");
        url.to_string()
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, ProviderError> {
        debug!("Exchanging authorization code at '{}'", self.config.token_uri);

        let form = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let resp = self
            .client
            .post(&self.config.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Exchange(format!("token endpoint unreachable: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Code exchange rejected with status {}: {}", status, body);
            return Err(ProviderError::Exchange(format!("status {}: {}", status, body)));
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Exchange(format!("bad token response: {}", e)))?;

        Self::token_set_from_response(&body, None).map_err(ProviderError::Exchange)
    }

    async fn fetch_profile(&self, tokens: &TokenSet) -> Result<Profile, ProviderError> {
        let resp = self
            .client
            .get(&self.config.userinfo_uri)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("userinfo endpoint unreachable: {}", e)))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!("Access token rejected by userinfo endpoint ({})", status);
            return Err(ProviderError::TokenInvalid);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!("status {}: {}", status, body)));
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Transport(format!("bad userinfo response: {}", e)))?;

        let name = body
            .get("name")
            .and_then(|n| n.as_str())
            .or_else(|| body.get("email").and_then(|e| e.as_str()))
            .unwrap_or("unknown")
            .to_string();

        Ok(Profile { name })
    }

    async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, ProviderError> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| ProviderError::RefreshFailed("no refresh token held".to_string()))?;

        debug!("Refreshing access token at '{}'", self.config.token_uri);

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .client
            .post(&self.config.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("token endpoint unreachable: {}", e)))?;

        let status = resp.status();
        if status.is_client_error() {
            // The refresh token itself was rejected. Terminal: the
            // session must be destroyed and the user re-authenticated.
            let body = resp.text().await.unwrap_or_default();
            warn!("Refresh token rejected with status {}: {}", status, body);
            return Err(ProviderError::RefreshFailed(format!("status {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!("status {}: {}", status, body)));
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Transport(format!("bad token response: {}", e)))?;

        Self::token_set_from_response(&body, tokens.refresh_token.as_deref())
            .map_err(ProviderError::RefreshFailed)
    }
}
