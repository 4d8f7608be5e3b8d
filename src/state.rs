//! Shared application state.
//!
//! Contains the state that is shared across all request handlers:
//! configuration, the session lifecycle manager, and the upload gateway.

use crate::config::ConfigV1;
use crate::session::SessionManager;
use crate::upload::DriveUploader;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Session/token lifecycle manager.
    pub sessions: Arc<SessionManager>,
    /// Gateway performing authorized uploads to external storage.
    pub uploader: Arc<DriveUploader>,
}
