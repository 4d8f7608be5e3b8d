//! Login-flow endpoints: initiation and provider callback.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::{routing::get, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;
use crate::models::session::SESSION_COOKIE;
use crate::state::AppState;
use crate::utils::http_helpers::request_origin;

/// Registers login-flow routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
}

/// Redirects the browser to the identity provider's authorization URL.
/// No session is created yet.
async fn login(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    let origin = request_origin(&headers, &state.config);
    Redirect::temporary(&state.sessions.begin_login(&origin))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// Provider callback: exchanges the authorization code, persists the
/// session, and hands the browser a signed session cookie. The origin
/// here must match the one used to initiate the login, or the provider
/// rejects the exchange.
async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect), AppError> {
    if let Some(error) = params.error {
        // The user denied consent, or the provider refused the request.
        warn!("Provider callback carried an error: {}", error);
        return Err(AppError::AuthExchange(format!("provider error: {}", error)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::AuthExchange("callback without authorization code".to_string()))?;

    let origin = request_origin(&headers, &state.config);
    let session = state.sessions.complete_login(&code, &origin).await?;

    let cookie = Cookie::build((
        SESSION_COOKIE,
        session.to_cookie_value(&state.config.session.secret),
    ))
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .build();

    Ok((jar.add(cookie), Redirect::temporary("/")))
}
