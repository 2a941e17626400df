use crate::errors::AppError;
use crate::handlers::AppState;
use crate::reconcile;
use crate::webhook_models::{LeadPayload, WebhookResponse};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

/// Make webhook handler
///
/// Receives lead data from the Make automation and reconciles it by phone
/// number: unseen phones create a lead, known phones are merged in place.
///
/// The body is taken raw so that malformed JSON and wrong field types both
/// surface as a 400 with the `{status, message}` error shape.
/// Authentication: X-Webhook-Token header must match WEBHOOK_SECRET when set.
pub async fn make_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    validate_webhook_secret(&state, &headers)?;

    let payload = LeadPayload::from_json_bytes(&body).map_err(|e| {
        tracing::warn!("Rejected Make webhook payload: {}", e);
        e
    })?;
    tracing::info!("Received Make webhook for telefono={}", payload.phone_key());

    let outcome = reconcile::reconcile(state.store.as_ref(), &payload).await?;

    Ok((
        StatusCode::OK,
        Json(WebhookResponse {
            status: "success".to_string(),
            message: "Datos actualizados correctamente".to_string(),
            created: outcome.created,
        }),
    ))
}

/// Validate webhook secret from X-Webhook-Token header
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // No secret configured: open endpoint (warned at startup)
    let Some(ref expected_secret) = state.config.webhook_secret else {
        return Ok(());
    };

    let token = headers
        .get("x-webhook-token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
