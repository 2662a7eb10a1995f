use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationCreatedEvent {
    pub reservation_id: Uuid,
    pub vehicle_type: String,
    pub passengers: u32,
    pub total_price: String,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationSource {
    Gateway,
    Webhook,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentReconciledEvent {
    pub reservation_id: Uuid,
    pub payment_id: Uuid,
    pub outcome: String,
    pub reservation_status: String,
    pub payment_status: String,
    pub source: ReconciliationSource,
    pub timestamp: DateTime<Utc>,
}

/// A payment notification that could not be applied as-is.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentAnomalyEvent {
    pub payment_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub recorded: String,
    pub received: String,
    pub reason: String,
    pub source: ReconciliationSource,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationStatusChangedEvent {
    pub reservation_id: Uuid,
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
}
