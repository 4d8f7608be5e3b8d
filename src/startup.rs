//! Application startup and server initialization.
//!
//! Builds the identity provider client, session store, lifecycle
//! manager and upload gateway, then wires the routes and serves.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::provider::oidc::OidcProvider;
use crate::routes;
use crate::session::SessionManager;
use crate::state::AppState;
use crate::store::create_store;
use crate::upload::DriveUploader;

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the specified
/// address or encounters a runtime error during execution.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let store = create_store(&config.store).await;
    let provider = Arc::new(OidcProvider::new(&config.provider));
    let sessions = Arc::new(SessionManager::new(
        provider,
        store,
        config.session.ttl_hours,
    ));
    let uploader = Arc::new(DriveUploader::new(&config.upload));

    info!("Starting server on {}", config.bind_address);

    let state = AppState {
        config: config.clone(),
        sessions,
        uploader,
    };

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .expect("Could not bind to specified address");

    axum::serve(listener, app).await?;

    Ok(())
}
