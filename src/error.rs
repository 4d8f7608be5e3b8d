use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Application-level failures, translated to the JSON error envelope
/// `{"success": false, "message": ...}` at the HTTP boundary.
///
/// Provider and store detail is kept for the logs; 500-class responses
/// carry a generic user-facing message instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("no valid session")]
    Unauthenticated,
    #[error("authorization code exchange failed: {0}")]
    AuthExchange(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("no receipt file in submission")]
    MissingReceipt,
    #[error("server misconfigured: {0}")]
    Misconfigured(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("identity provider unreachable: {0}")]
    Provider(String),
    #[error("session store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthenticated => {
                tracing::debug!("Request rejected: no valid session");
                (StatusCode::UNAUTHORIZED, "Usuário não autenticado.".to_string())
            }
            AppError::AuthExchange(detail) => {
                tracing::warn!(detail = %detail, "Authorization code exchange failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Falha na autenticação com o provedor.".to_string(),
                )
            }
            AppError::Validation(msg) => {
                tracing::debug!(message = %msg, "Invalid submission");
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::MissingReceipt => {
                tracing::debug!("Submission rejected: no receipt file");
                (
                    StatusCode::BAD_REQUEST,
                    "Nenhum comprovante foi enviado.".to_string(),
                )
            }
            AppError::Misconfigured(detail) => {
                // Deployment defect, not user-correctable. Log loudly.
                tracing::error!(detail = %detail, "Server misconfiguration");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "O servidor não está configurado corretamente.".to_string(),
                )
            }
            AppError::Upload(detail) => {
                tracing::error!(detail = %detail, "Upload to external storage failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Falha ao enviar o comprovante.".to_string(),
                )
            }
            AppError::Provider(detail) => {
                tracing::warn!(detail = %detail, "Identity provider call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Falha na comunicação com o provedor de identidade.".to_string(),
                )
            }
            AppError::Store(detail) => {
                tracing::error!(detail = %detail, "Session store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno do servidor.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}
