use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use goldenvan_core::{PaymentStatus, ReservationStatus};
use goldenvan_reservation::Disposition;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub payment_id: Uuid,
    pub disposition: Disposition,
    pub reservation_status: Option<ReservationStatus>,
    pub payment_status: Option<PaymentStatus>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/payment-webhook", post(handle_payment_webhook))
}

/// POST /payment-webhook
///
/// Acknowledged with 200 whenever the notification was understood, including duplicates
/// and ignored conflicts. Every failure is a JSON error body.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid webhook body: {}", e)))?;

    let reconciliation = state.webhooks.handle_payload(payload).await.map_err(|e| {
        tracing::warn!("Payment webhook rejected: {}", e);
        AppError::from(e)
    })?;

    Ok(Json(WebhookAck {
        received: true,
        payment_id: reconciliation.payment.id,
        disposition: reconciliation.disposition,
        reservation_status: reconciliation.reservation.as_ref().map(|r| r.status),
        payment_status: reconciliation.reservation.as_ref().map(|r| r.payment_status),
    }))
}
