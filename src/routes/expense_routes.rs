//! Expense submission endpoint.

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::models::{ExpenseSubmission, SessionId};
use crate::state::AppState;

/// Registers the expense submission route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/submit-expense", post(submit_expense))
}

/// Accepts a multipart form (`description`, `amount`, `receipt` file),
/// uploads the receipt under the authenticated identity, and returns
/// the durable reference. All failure responses are JSON envelopes.
async fn submit_expense(
    SessionId(session_id): SessionId,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let session_id = session_id.ok_or(AppError::Unauthenticated)?;
    let tokens = state.sessions.authorized_tokens(&session_id).await?;

    let submission = parse_submission(multipart).await?;
    let result = state.uploader.submit(&tokens, submission).await?;

    Ok(Json(json!({
        "success": true,
        "fileId": result.file_id,
        "fileLink": result.link,
    })))
}

/// Collects the form fields. Field read errors (aborted uploads,
/// malformed bodies) are client-correctable, so 400-class.
async fn parse_submission(mut multipart: Multipart) -> Result<ExpenseSubmission, AppError> {
    let mut description: Option<String> = None;
    let mut amount: Option<String> = None;
    let mut receipt: Option<(Bytes, String, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Formulário inválido: {}", e)))?
    {
        match field.name() {
            Some("description") => {
                description = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Formulário inválido: {}", e))
                })?);
            }
            Some("amount") => {
                amount = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Formulário inválido: {}", e))
                })?);
            }
            Some("receipt") => {
                let original_filename = field
                    .file_name()
                    .unwrap_or("comprovante")
                    .to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Falha ao ler o comprovante: {}", e))
                })?;
                receipt = Some((data, mime_type, original_filename));
            }
            _ => {}
        }
    }

    let description = description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::Validation("A descrição é obrigatória.".to_string()))?;

    let amount = parse_amount(
        amount
            .as_deref()
            .ok_or_else(|| AppError::Validation("O valor é obrigatório.".to_string()))?,
    )?;

    let (data, mime_type, original_filename) = receipt.ok_or(AppError::MissingReceipt)?;
    if data.is_empty() {
        return Err(AppError::MissingReceipt);
    }

    Ok(ExpenseSubmission {
        description,
        amount,
        receipt: data,
        mime_type,
        original_filename,
    })
}

/// Accepts both "42.50" and the Brazilian "42,50".
fn parse_amount(raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite() && *a >= 0.0)
        .ok_or_else(|| AppError::Validation("Valor inválido.".to_string()))
}
