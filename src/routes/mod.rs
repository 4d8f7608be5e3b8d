//! HTTP route definitions and handlers.
//!
//! This module organizes all HTTP endpoints into logical groups:
//! login flow, session introspection, expense submission, and health.

mod auth_routes;
mod expense_routes;
mod health_routes;
mod user_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes::routes())
        .merge(user_routes::routes())
        .merge(expense_routes::routes())
        .merge(health_routes::routes())
        .with_state(state)
}
