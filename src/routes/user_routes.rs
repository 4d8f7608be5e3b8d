//! Session introspection and logout endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::models::session::SESSION_COOKIE;
use crate::models::SessionId;
use crate::state::AppState;

/// Registers session introspection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/user", get(current_user))
        .route("/api/logout", post(logout))
}

fn logged_out() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "loggedIn": false }))).into_response()
}

/// Reports who is logged in. Internally this validates the access
/// token against the provider, refreshing it transparently when the
/// provider rejects it; only a failed refresh surfaces here, as a 401.
async fn current_user(SessionId(session_id): SessionId, State(state): State<AppState>) -> Response {
    let Some(session_id) = session_id else {
        return logged_out();
    };

    match state.sessions.current_user(&session_id).await {
        Ok(profile) => (
            StatusCode::OK,
            Json(json!({ "loggedIn": true, "name": profile.name })),
        )
            .into_response(),
        Err(AppError::Unauthenticated) => logged_out(),
        Err(e) => e.into_response(),
    }
}

/// Destroys the session record and clears the cookie. Idempotent: a
/// second logout still succeeds.
async fn logout(
    SessionId(session_id): SessionId,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), AppError> {
    if let Some(session_id) = session_id {
        state.sessions.logout(&session_id).await?;
    }

    let mut removal = Cookie::from(SESSION_COOKIE);
    removal.set_path("/");

    Ok((jar.remove(removal), Json(json!({ "success": true }))))
}
