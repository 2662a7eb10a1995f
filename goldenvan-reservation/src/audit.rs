//! Structured lifecycle events, logged under the `audit` target.

use chrono::Utc;
use goldenvan_core::{PaymentRecord, Reservation, ReservationStatus};
use goldenvan_shared::models::events::{
    PaymentAnomalyEvent, PaymentReconciledEvent, ReconciliationSource, ReservationCreatedEvent,
    ReservationStatusChangedEvent,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

fn payload<T: Serialize>(event: &T) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"serializationError\":\"{}\"}}", e))
}

pub fn reservation_created(reservation: &Reservation) {
    let event = ReservationCreatedEvent {
        reservation_id: reservation.id,
        vehicle_type: reservation.vehicle_type.clone(),
        passengers: reservation.passengers,
        total_price: reservation.price.to_string(),
        currency: reservation.currency.clone(),
        timestamp: Utc::now(),
    };
    info!(target: "audit", kind = "reservation_created", payload = %payload(&event));
}

pub fn payment_reconciled(record: &PaymentRecord, reservation: &Reservation, source: ReconciliationSource) {
    let event = PaymentReconciledEvent {
        reservation_id: reservation.id,
        payment_id: record.id,
        outcome: record.status.to_string(),
        reservation_status: reservation.status.to_string(),
        payment_status: reservation.payment_status.to_string(),
        source,
        timestamp: Utc::now(),
    };
    info!(target: "audit", kind = "payment_reconciled", payload = %payload(&event));
}

pub fn payment_anomaly(
    payment_id: Uuid,
    reservation_id: Option<Uuid>,
    recorded: impl ToString,
    received: impl ToString,
    reason: &str,
    source: ReconciliationSource,
) {
    let event = PaymentAnomalyEvent {
        payment_id,
        reservation_id,
        recorded: recorded.to_string(),
        received: received.to_string(),
        reason: reason.to_string(),
        source,
        timestamp: Utc::now(),
    };
    warn!(target: "audit", kind = "payment_anomaly", payload = %payload(&event));
}

pub fn status_changed(reservation_id: Uuid, from: ReservationStatus, to: ReservationStatus) {
    let event = ReservationStatusChangedEvent {
        reservation_id,
        from: from.to_string(),
        to: to.to_string(),
        timestamp: Utc::now(),
    };
    info!(target: "audit", kind = "reservation_status_changed", payload = %payload(&event));
}
