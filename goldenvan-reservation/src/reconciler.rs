use goldenvan_core::{CoreError, CoreResult, PaymentOutcome, PaymentResolution};
use goldenvan_shared::models::events::ReconciliationSource;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::audit;
use crate::manager::{Disposition, Reconciliation, ReservationManager};

/// Provider notification about a charge outcome.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookNotification {
    pub payment_id: String,
    #[serde(default)]
    pub reservation_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Applies asynchronous payment notifications. Reconciliation only: a notification never
/// creates a reservation or a payment record.
pub struct WebhookReconciler {
    manager: Arc<ReservationManager>,
}

impl WebhookReconciler {
    pub fn new(manager: Arc<ReservationManager>) -> Self {
        Self { manager }
    }

    /// Parse and apply a raw webhook body. The body is stored on the payment record as
    /// received.
    pub async fn handle_payload(&self, payload: Value) -> CoreResult<Reconciliation> {
        let notification: WebhookNotification = serde_json::from_value(payload.clone())
            .map_err(|e| CoreError::Validation(format!("Malformed payment notification: {}", e)))?;
        self.handle(notification, Some(payload)).await
    }

    pub async fn handle(&self, notification: WebhookNotification, raw: Option<Value>) -> CoreResult<Reconciliation> {
        let outcome: PaymentOutcome = notification.status.trim().parse()?;
        let payment_id = Uuid::parse_str(notification.payment_id.trim())
            .map_err(|_| CoreError::UnknownPayment(notification.payment_id.clone()))?;

        let record = self
            .manager
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| CoreError::UnknownPayment(payment_id.to_string()))?;

        if let Some(claimed) = notification.reservation_id.as_deref() {
            if Uuid::parse_str(claimed.trim()).ok() != Some(record.reservation_id) {
                audit::payment_anomaly(
                    record.id,
                    Some(record.reservation_id),
                    record.reservation_id,
                    claimed,
                    "notification names a different reservation",
                    ReconciliationSource::Webhook,
                );
                return Ok(Reconciliation {
                    payment: record,
                    reservation: None,
                    disposition: Disposition::ReservationMismatch,
                });
            }
        }

        let resolution = PaymentResolution {
            outcome,
            transaction_id: notification.transaction_id,
            raw,
        };
        let reconciliation = self
            .manager
            .apply_payment_outcome(payment_id, resolution, ReconciliationSource::Webhook)
            .await?;

        info!(
            "Webhook for payment {} ({}) handled: {:?}",
            payment_id, outcome, reconciliation.disposition
        );
        Ok(reconciliation)
    }
}
