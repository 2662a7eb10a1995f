use goldenvan_catalog::{parse_booking_date, parse_booking_time, FareCalculator, FareRequest, PriceBreakdown};
use goldenvan_core::distance::{DistanceError, DistanceEstimate, DistanceResolver};
use goldenvan_core::payment::{Buyer, CardDetails, ChargeRequest, PaymentGateway};
use goldenvan_core::repository::{PaymentStore, ReservationStore, VehicleCatalog};
use goldenvan_core::{
    Coordinates, CoreError, CoreResult, Location, NewReservation, PaymentOutcome, PaymentRecord,
    PaymentResolution, Reservation, ReservationFilter, ReservationStatus, ReservationUpdate,
    Settlement,
};
use goldenvan_shared::models::events::ReconciliationSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit;

/// Customer booking form as submitted. Every field is optional here so that missing ones
/// can be reported together; status, payment status and price are not part of it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub pickup_location: Option<Location>,
    pub dropoff_location: Option<Location>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub passengers: Option<u32>,
    pub vehicle_type: Option<String>,
}

fn required(value: &Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(field);
            String::new()
        }
    }
}

impl BookingDraft {
    fn validate(self) -> CoreResult<NewReservation> {
        let mut missing = Vec::new();
        let customer_name = required(&self.customer_name, "customerName", &mut missing);
        let customer_email = required(&self.customer_email, "customerEmail", &mut missing);
        let customer_phone = required(&self.customer_phone, "customerPhone", &mut missing);
        let date = required(&self.date, "date", &mut missing);
        let time = required(&self.time, "time", &mut missing);
        let vehicle_type = required(&self.vehicle_type, "vehicleType", &mut missing);
        if self.pickup_location.is_none() {
            missing.push("pickupLocation");
        }
        if self.dropoff_location.is_none() {
            missing.push("dropoffLocation");
        }
        if self.passengers.is_none() {
            missing.push("passengers");
        }

        let (Some(pickup_location), Some(dropoff_location), Some(passengers)) =
            (self.pickup_location, self.dropoff_location, self.passengers)
        else {
            return Err(CoreError::Validation(format!("Missing required fields: {}", missing.join(", "))));
        };
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!("Missing required fields: {}", missing.join(", "))));
        }

        for (field, location) in [("pickupLocation", &pickup_location), ("dropoffLocation", &dropoff_location)] {
            if location.address.trim().is_empty() || !location.coordinates.is_valid() {
                return Err(CoreError::Validation(format!("{} needs an address and valid coordinates", field)));
            }
        }

        Ok(NewReservation {
            customer_name,
            customer_email,
            customer_phone,
            pickup_location,
            dropoff_location,
            date: parse_booking_date(&date)?,
            time: parse_booking_time(&time)?,
            passengers,
            vehicle_type,
            // Filled in from the resolver and the calculator
            distance_km: Default::default(),
            price: Default::default(),
            currency: String::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub reservation: Reservation,
    pub price: PriceBreakdown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    pub card: CardDetails,
    pub buyer: Buyer,
}

#[derive(Debug, Clone)]
pub struct PaymentAttempt {
    pub reservation: Reservation,
    pub payment: PaymentRecord,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The outcome settled the payment record and was applied to the reservation.
    Applied,
    /// Same outcome as already recorded; nothing new to apply.
    Duplicate,
    /// A different outcome than already recorded; ignored.
    Conflict,
    /// The notification named another reservation than the payment record; ignored.
    ReservationMismatch,
    /// The outcome belongs to an earlier attempt on a retried payment; ignored.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub payment: PaymentRecord,
    /// `None` when the reservation has since been deleted.
    pub reservation: Option<Reservation>,
    pub disposition: Disposition,
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub gateway: Duration,
    pub distance: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            gateway: Duration::from_secs(10),
            distance: Duration::from_secs(10),
        }
    }
}

/// Drives a reservation from booking to payment reconciliation and the admin end states.
///
/// Holds no per-request state: everything durable lives behind the store traits.
pub struct ReservationManager {
    reservations: Arc<dyn ReservationStore>,
    payments: Arc<dyn PaymentStore>,
    vehicles: Arc<dyn VehicleCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    distance: Arc<dyn DistanceResolver>,
    calculator: FareCalculator,
    timeouts: Timeouts,
}

impl ReservationManager {
    pub fn new(
        reservations: Arc<dyn ReservationStore>,
        payments: Arc<dyn PaymentStore>,
        vehicles: Arc<dyn VehicleCatalog>,
        gateway: Arc<dyn PaymentGateway>,
        distance: Arc<dyn DistanceResolver>,
        calculator: FareCalculator,
    ) -> Self {
        Self {
            reservations,
            payments,
            vehicles,
            gateway,
            distance,
            calculator,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Price a trip without booking it.
    pub async fn quote(&self, request: &FareRequest) -> CoreResult<PriceBreakdown> {
        let vehicle = self.vehicles.find_by_type(&request.vehicle_type).await?;
        Ok(self.calculator.compute_price(vehicle.as_ref(), request)?)
    }

    pub async fn resolve_distance(&self, origin: Coordinates, destination: Coordinates) -> CoreResult<DistanceEstimate> {
        if !origin.is_valid() || !destination.is_valid() {
            return Err(CoreError::Validation("origin and destination need valid coordinates".to_string()));
        }

        match timeout(self.timeouts.distance, self.distance.resolve(origin, destination)).await {
            Ok(Ok(estimate)) => Ok(estimate),
            Ok(Err(DistanceError::NoRoute(reason))) => {
                Err(CoreError::Validation(format!("No route between pickup and dropoff: {}", reason)))
            }
            Ok(Err(e)) => {
                warn!("Distance lookup failed: {}", e);
                Err(CoreError::DistanceUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!("Distance lookup timed out after {:?}", self.timeouts.distance);
                Err(CoreError::DistanceUnavailable("distance lookup timed out".to_string()))
            }
        }
    }

    /// Validate, price once, and persist at pending/pending.
    pub async fn submit_booking(&self, draft: BookingDraft) -> CoreResult<BookingConfirmation> {
        let mut booking = draft.validate()?;

        let estimate = self
            .resolve_distance(booking.pickup_location.coordinates, booking.dropoff_location.coordinates)
            .await?;

        let price = self
            .quote(&FareRequest {
                vehicle_type: booking.vehicle_type.clone(),
                distance_km: estimate.kilometers(),
                booking_date: booking.date,
                passengers: booking.passengers,
            })
            .await?;

        booking.distance_km = estimate.kilometers();
        booking.price = price.total_price;
        booking.currency = price.currency.clone();

        let reservation = self.reservations.create(booking).await?;
        audit::reservation_created(&reservation);

        Ok(BookingConfirmation { reservation, price })
    }

    /// Charge the stored price for a pending reservation.
    ///
    /// A transport failure leaves the reservation untouched and returns `GatewayUnavailable`;
    /// the opened payment record stays pending so a later webhook can still settle it.
    pub async fn initiate_payment(&self, reservation_id: Uuid, submission: PaymentSubmission) -> CoreResult<PaymentAttempt> {
        let reservation = self.reservations.get(reservation_id).await?;
        if reservation.status != ReservationStatus::Pending {
            return Err(CoreError::AlreadyFinalized(format!(
                "reservation {} is {}",
                reservation_id, reservation.status
            )));
        }

        let record = self
            .payments
            .open_attempt(reservation_id, reservation.price, &reservation.currency)
            .await?;

        let request = ChargeRequest {
            payment_id: record.id,
            reservation_id,
            amount: reservation.price,
            currency: reservation.currency.clone(),
            card: submission.card,
            buyer: submission.buyer,
        };

        info!(
            "Charging {} {} for reservation {} (payment {}, attempt {}, card ending {})",
            request.amount,
            request.currency,
            reservation_id,
            record.id,
            record.attempts,
            request.card.card_number.last_four()
        );

        let response = match timeout(self.timeouts.gateway, self.gateway.charge(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Payment gateway failed for reservation {}: {}", reservation_id, e);
                return Err(CoreError::GatewayUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(
                    "Payment gateway timed out after {:?} for reservation {}",
                    self.timeouts.gateway, reservation_id
                );
                return Err(CoreError::GatewayUnavailable("payment gateway timed out".to_string()));
            }
        };

        let resolution = PaymentResolution {
            outcome: response.outcome,
            transaction_id: Some(response.provider_id),
            raw: Some(response.raw),
        };
        let reconciliation = self
            .apply_payment_outcome(record.id, resolution, ReconciliationSource::Gateway)
            .await?;

        // A webhook may have settled the record first; report what was recorded.
        let outcome = reconciliation.payment.status.outcome().unwrap_or(response.outcome);
        let reservation = match reconciliation.reservation {
            Some(reservation) => reservation,
            None => self.reservations.get(reservation_id).await?,
        };

        Ok(PaymentAttempt {
            reservation,
            payment: reconciliation.payment,
            outcome,
        })
    }

    /// The single path that moves a reservation's payment status, and with it the only
    /// way a reservation becomes confirmed. The first terminal outcome for a payment wins.
    pub async fn apply_payment_outcome(
        &self,
        payment_id: Uuid,
        resolution: PaymentResolution,
        source: ReconciliationSource,
    ) -> CoreResult<Reconciliation> {
        match self.payments.settle(payment_id, &resolution).await? {
            Settlement::Applied(record) => {
                let reservation = self.reconcile_reservation(&record, source).await?;
                Ok(Reconciliation { payment: record, reservation, disposition: Disposition::Applied })
            }
            Settlement::AlreadySettled(record) if record.status.outcome() == Some(resolution.outcome) => {
                debug!("Payment {} already recorded as {}", record.id, record.status);
                let reservation = match self.find_reservation(record.reservation_id).await? {
                    // Settled but not yet reflected, e.g. the first writer failed midway
                    Some(current) if current.payment_status != resolution.outcome.payment_status() => {
                        self.reconcile_reservation(&record, source).await?
                    }
                    current => current,
                };
                Ok(Reconciliation { payment: record, reservation, disposition: Disposition::Duplicate })
            }
            Settlement::Superseded(record) => {
                audit::payment_anomaly(
                    record.id,
                    Some(record.reservation_id),
                    format!("attempt {}", record.attempts),
                    resolution.outcome,
                    "outcome for a superseded payment attempt",
                    source,
                );
                let reservation = self.find_reservation(record.reservation_id).await?;
                Ok(Reconciliation { payment: record, reservation, disposition: Disposition::Stale })
            }
            Settlement::AlreadySettled(record) => {
                audit::payment_anomaly(
                    record.id,
                    Some(record.reservation_id),
                    record.status,
                    resolution.outcome,
                    "conflicting outcome for a settled payment; first outcome kept",
                    source,
                );
                let reservation = self.find_reservation(record.reservation_id).await?;
                Ok(Reconciliation { payment: record, reservation, disposition: Disposition::Conflict })
            }
        }
    }

    async fn reconcile_reservation(
        &self,
        record: &PaymentRecord,
        source: ReconciliationSource,
    ) -> CoreResult<Option<Reservation>> {
        let outcome = record
            .status
            .outcome()
            .ok_or_else(|| CoreError::Internal(format!("payment {} is not settled", record.id)))?;

        match self.reservations.update_payment(record.reservation_id, outcome.payment_status()).await {
            Ok(reservation) => {
                if outcome == PaymentOutcome::Success && reservation.status == ReservationStatus::Cancelled {
                    audit::payment_anomaly(
                        record.id,
                        Some(reservation.id),
                        reservation.status,
                        outcome,
                        "payment captured for a cancelled reservation; refund required",
                        source,
                    );
                }
                audit::payment_reconciled(record, &reservation, source);
                Ok(Some(reservation))
            }
            Err(CoreError::NotFound(_)) => {
                audit::payment_anomaly(
                    record.id,
                    Some(record.reservation_id),
                    record.status,
                    outcome,
                    "reservation no longer exists",
                    source,
                );
                Ok(None)
            }
            Err(CoreError::InvalidTransition { from, .. }) => {
                audit::payment_anomaly(
                    record.id,
                    Some(record.reservation_id),
                    from,
                    outcome,
                    "outcome would downgrade a paid reservation",
                    source,
                );
                self.find_reservation(record.reservation_id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn find_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        match self.reservations.get(id).await {
            Ok(reservation) => Ok(Some(reservation)),
            Err(CoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn find_payment(&self, payment_id: Uuid) -> CoreResult<Option<PaymentRecord>> {
        self.payments.get(payment_id).await
    }

    pub async fn payment_for(&self, reservation_id: Uuid) -> CoreResult<Option<PaymentRecord>> {
        self.payments.find_by_reservation(reservation_id).await
    }

    /// confirmed -> completed.
    pub async fn mark_completed(&self, id: Uuid) -> CoreResult<Reservation> {
        let reservation = self
            .reservations
            .update_status(id, ReservationStatus::Completed, &[ReservationStatus::Confirmed])
            .await?;
        audit::status_changed(id, ReservationStatus::Confirmed, ReservationStatus::Completed);
        Ok(reservation)
    }

    /// Any non-terminal status -> cancelled.
    pub async fn cancel(&self, id: Uuid) -> CoreResult<Reservation> {
        let current = self.reservations.get(id).await?;
        if current.status.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: current.status.to_string(),
                to: ReservationStatus::Cancelled.to_string(),
            });
        }

        let reservation = self
            .reservations
            .update_status(
                id,
                ReservationStatus::Cancelled,
                &[ReservationStatus::Pending, ReservationStatus::Confirmed],
            )
            .await?;
        audit::status_changed(id, current.status, ReservationStatus::Cancelled);
        Ok(reservation)
    }

    /// Admin edit. A requested status goes through the lifecycle rules first, then the
    /// allow-listed detail fields are merged.
    pub async fn update(
        &self,
        id: Uuid,
        details: ReservationUpdate,
        status: Option<ReservationStatus>,
    ) -> CoreResult<Reservation> {
        let mut reservation = match status {
            None => None,
            Some(ReservationStatus::Completed) => Some(self.mark_completed(id).await?),
            Some(ReservationStatus::Cancelled) => Some(self.cancel(id).await?),
            Some(requested) => {
                let current = self.reservations.get(id).await?;
                return Err(CoreError::InvalidTransition {
                    from: current.status.to_string(),
                    to: requested.to_string(),
                });
            }
        };

        if !details.is_empty() {
            reservation = Some(self.reservations.update_details(id, &details).await?);
        }

        match reservation {
            Some(reservation) => Ok(reservation),
            None => self.reservations.get(id).await,
        }
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Reservation> {
        self.reservations.get(id).await
    }

    pub async fn list(&self, filter: &ReservationFilter) -> CoreResult<Vec<Reservation>> {
        self.reservations.list(filter).await
    }

    pub async fn delete(&self, id: Uuid) -> CoreResult<()> {
        self.reservations.delete(id).await?;
        info!("Deleted reservation {}", id);
        Ok(())
    }

    pub async fn vehicles(&self, active_only: bool) -> CoreResult<Vec<goldenvan_core::Vehicle>> {
        self.vehicles.list(active_only).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::StaticDistanceResolver;
    use crate::gateway::MockPaymentGateway;
    use goldenvan_catalog::PricingConfig;
    use goldenvan_core::{PaymentRecordStatus, PaymentStatus};
    use goldenvan_shared::Masked;
    use goldenvan_store::{InMemoryPaymentStore, InMemoryReservationStore, InMemoryVehicleCatalog};
    use rust_decimal::Decimal;

    const DECLINED_CARD: &str = "4111111111111129";
    const GOOD_CARD: &str = "5528790000000008";

    struct Harness {
        manager: ReservationManager,
        gateway: Arc<MockPaymentGateway>,
        payments: Arc<InMemoryPaymentStore>,
    }

    fn harness_with(gateway: MockPaymentGateway, timeouts: Timeouts) -> Harness {
        let gateway = Arc::new(gateway);
        let payments = Arc::new(InMemoryPaymentStore::new());
        let manager = ReservationManager::new(
            Arc::new(InMemoryReservationStore::new()),
            payments.clone(),
            Arc::new(InMemoryVehicleCatalog::default()),
            gateway.clone(),
            Arc::new(StaticDistanceResolver::new(20_000, 1_800)),
            FareCalculator::new(PricingConfig::default()),
        )
        .with_timeouts(timeouts);
        Harness { manager, gateway, payments }
    }

    fn harness() -> Harness {
        harness_with(MockPaymentGateway::new(vec![DECLINED_CARD.to_string()]), Timeouts::default())
    }

    fn location(address: &str, lat: f64, lng: f64) -> Location {
        Location { address: address.to_string(), coordinates: Coordinates { lat, lng } }
    }

    fn draft(passengers: u32) -> BookingDraft {
        BookingDraft {
            customer_name: Some("Ayse Yilmaz".to_string()),
            customer_email: Some("ayse@example.com".to_string()),
            customer_phone: Some("+90 555 000 0000".to_string()),
            pickup_location: Some(location("Istanbul Airport", 41.2753, 28.7519)),
            dropoff_location: Some(location("Taksim", 41.0370, 28.9850)),
            date: Some("2025-03-15".to_string()),
            time: Some("10:30".to_string()),
            passengers: Some(passengers),
            vehicle_type: Some("sedan".to_string()),
        }
    }

    fn submission(card_number: &str) -> PaymentSubmission {
        PaymentSubmission {
            card: CardDetails {
                card_holder_name: "Ayse Yilmaz".to_string(),
                card_number: Masked::new(card_number.to_string()),
                expire_month: "12".to_string(),
                expire_year: "2030".to_string(),
                cvc: Masked::new("123".to_string()),
            },
            buyer: Buyer {
                name: "Ayse".to_string(),
                surname: Some("Yilmaz".to_string()),
                email: "ayse@example.com".to_string(),
                phone: None,
                address: "Taksim".to_string(),
                city: None,
                country: None,
            },
        }
    }

    fn webhook(outcome: PaymentOutcome) -> PaymentResolution {
        PaymentResolution { outcome, transaction_id: Some("tx-webhook".to_string()), raw: None }
    }

    #[tokio::test]
    async fn test_submit_booking_prices_once_and_starts_pending() {
        let h = harness();
        let confirmation = h.manager.submit_booking(draft(2)).await.unwrap();

        assert_eq!(confirmation.price.total_price, Decimal::new(60000, 2));
        assert_eq!(confirmation.reservation.price, Decimal::from(600));
        assert_eq!(confirmation.reservation.distance_km, Decimal::from(20));
        assert_eq!(confirmation.reservation.currency, "TRY");
        assert_eq!(confirmation.reservation.status, ReservationStatus::Pending);
        assert_eq!(confirmation.reservation.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_capacity_exceeded_creates_nothing() {
        let h = harness();
        let err = h.manager.submit_booking(draft(4)).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded { passengers: 4, capacity: 3 }));
        assert!(h.manager.list(&ReservationFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_fields_are_reported_together() {
        let h = harness();
        let mut incomplete = draft(2);
        incomplete.pickup_location = None;
        incomplete.time = Some("  ".to_string());

        match h.manager.submit_booking(incomplete).await.unwrap_err() {
            CoreError::Validation(message) => {
                assert!(message.contains("pickupLocation"));
                assert!(message.contains("time"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_vehicle() {
        let h = harness();
        let mut limo = draft(2);
        limo.vehicle_type = Some("limousine".to_string());
        assert!(matches!(h.manager.submit_booking(limo).await, Err(CoreError::InvalidVehicle(_))));
    }

    #[tokio::test]
    async fn test_successful_payment_confirms_and_duplicate_webhook_is_noop() {
        let h = harness();
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;

        let attempt = h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await.unwrap();
        assert_eq!(attempt.outcome, PaymentOutcome::Success);
        assert_eq!(attempt.reservation.status, ReservationStatus::Confirmed);
        assert_eq!(attempt.reservation.payment_status, PaymentStatus::Paid);
        assert_eq!(attempt.payment.status, PaymentRecordStatus::Success);

        let before = h.manager.get(booked.id).await.unwrap();
        let duplicate = h
            .manager
            .apply_payment_outcome(attempt.payment.id, webhook(PaymentOutcome::Success), ReconciliationSource::Webhook)
            .await
            .unwrap();
        assert_eq!(duplicate.disposition, Disposition::Duplicate);

        let after = h.manager.get(booked.id).await.unwrap();
        assert_eq!(after, before);
        assert_eq!(h.gateway.charge_count(), 1);
    }

    #[tokio::test]
    async fn test_declined_then_retry_succeeds() {
        let h = harness();
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;

        let declined = h.manager.initiate_payment(booked.id, submission(DECLINED_CARD)).await.unwrap();
        assert_eq!(declined.outcome, PaymentOutcome::Failure);
        assert_eq!(declined.reservation.status, ReservationStatus::Pending);
        assert_eq!(declined.reservation.payment_status, PaymentStatus::Failed);

        let retried = h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await.unwrap();
        assert_eq!(retried.reservation.status, ReservationStatus::Confirmed);
        assert_eq!(retried.reservation.payment_status, PaymentStatus::Paid);
        assert_eq!(retried.payment.id, declined.payment.id);
        assert_eq!(retried.payment.attempts, 2);
    }

    #[tokio::test]
    async fn test_late_outcome_for_earlier_attempt_does_not_block_retry() {
        let h = harness();
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;

        let declined = h.manager.initiate_payment(booked.id, submission(DECLINED_CARD)).await.unwrap();
        let first_tx = declined.payment.transaction_id.clone().unwrap();

        // Second attempt in flight
        let reopened = h.payments.open_attempt(booked.id, booked.price, &booked.currency).await.unwrap();
        assert_eq!(reopened.status, PaymentRecordStatus::Pending);
        assert_eq!(reopened.transaction_id, None);
        assert_eq!(reopened.superseded_transaction_ids, vec![first_tx.clone()]);

        let late = PaymentResolution {
            outcome: PaymentOutcome::Failure,
            transaction_id: Some(first_tx),
            raw: None,
        };
        let stale = h
            .manager
            .apply_payment_outcome(reopened.id, late, ReconciliationSource::Webhook)
            .await
            .unwrap();
        assert_eq!(stale.disposition, Disposition::Stale);
        assert_eq!(stale.payment.status, PaymentRecordStatus::Pending);

        let charged = PaymentResolution {
            outcome: PaymentOutcome::Success,
            transaction_id: Some("tx-second-attempt".to_string()),
            raw: None,
        };
        let applied = h
            .manager
            .apply_payment_outcome(reopened.id, charged, ReconciliationSource::Gateway)
            .await
            .unwrap();
        assert_eq!(applied.disposition, Disposition::Applied);

        let current = h.manager.get(booked.id).await.unwrap();
        assert_eq!((current.status, current.payment_status), (ReservationStatus::Confirmed, PaymentStatus::Paid));
    }

    #[tokio::test]
    async fn test_gateway_unavailable_leaves_reservation_untouched() {
        let h = harness();
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;
        h.gateway.set_available(false);

        let err = h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await.unwrap_err();
        assert!(matches!(err, CoreError::GatewayUnavailable(_)));
        assert!(err.is_retriable());

        let current = h.manager.get(booked.id).await.unwrap();
        assert_eq!((current.status, current.payment_status), (ReservationStatus::Pending, PaymentStatus::Pending));
    }

    #[tokio::test]
    async fn test_gateway_timeout_is_unavailable_and_webhook_settles_later() {
        let h = harness_with(
            MockPaymentGateway::default().with_latency(Duration::from_millis(200)),
            Timeouts { gateway: Duration::from_millis(20), distance: Duration::from_secs(1) },
        );
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;

        let err = h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await.unwrap_err();
        assert!(matches!(err, CoreError::GatewayUnavailable(_)));

        let record = h.payments.find_by_reservation(booked.id).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentRecordStatus::Pending);

        let applied = h
            .manager
            .apply_payment_outcome(record.id, webhook(PaymentOutcome::Success), ReconciliationSource::Webhook)
            .await
            .unwrap();
        assert_eq!(applied.disposition, Disposition::Applied);
        assert_eq!(applied.reservation.unwrap().status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_payment_on_finalized_reservation() {
        let h = harness();
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;
        h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await.unwrap();

        let err = h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyFinalized(_)));
        assert_eq!(h.gateway.charge_count(), 1);

        let missing = h.manager.initiate_payment(Uuid::new_v4(), submission(GOOD_CARD)).await.unwrap_err();
        assert!(matches!(missing, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_conflicting_outcome_keeps_first() {
        let h = harness();
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;
        let attempt = h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await.unwrap();

        let conflict = h
            .manager
            .apply_payment_outcome(attempt.payment.id, webhook(PaymentOutcome::Failure), ReconciliationSource::Webhook)
            .await
            .unwrap();
        assert_eq!(conflict.disposition, Disposition::Conflict);
        assert_eq!(conflict.payment.status, PaymentRecordStatus::Success);

        let current = h.manager.get(booked.id).await.unwrap();
        assert_eq!((current.status, current.payment_status), (ReservationStatus::Confirmed, PaymentStatus::Paid));
    }

    #[tokio::test]
    async fn test_success_after_cancel_marks_paid_but_stays_cancelled() {
        let h = harness_with(
            MockPaymentGateway::default().with_latency(Duration::from_millis(200)),
            Timeouts { gateway: Duration::from_millis(20), distance: Duration::from_secs(1) },
        );
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;
        let _ = h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await;
        h.manager.cancel(booked.id).await.unwrap();

        let record = h.manager.payment_for(booked.id).await.unwrap().unwrap();
        let applied = h
            .manager
            .apply_payment_outcome(record.id, webhook(PaymentOutcome::Success), ReconciliationSource::Webhook)
            .await
            .unwrap();
        let reservation = applied.reservation.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Cancelled);
        assert_eq!(reservation.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_confirmed_always_has_successful_payment_record() {
        let h = harness();
        for card in [GOOD_CARD, DECLINED_CARD, GOOD_CARD] {
            let booked = h.manager.submit_booking(draft(1)).await.unwrap().reservation;
            let _ = h.manager.initiate_payment(booked.id, submission(card)).await;
        }

        for reservation in h.manager.list(&ReservationFilter::default()).await.unwrap() {
            if reservation.status == ReservationStatus::Confirmed {
                let record = h.manager.payment_for(reservation.id).await.unwrap().unwrap();
                assert_eq!(record.status, PaymentRecordStatus::Success);
            }
        }
    }

    #[tokio::test]
    async fn test_admin_transitions() {
        let h = harness();
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;

        // Only confirmed reservations complete
        assert!(matches!(
            h.manager.mark_completed(booked.id).await,
            Err(CoreError::InvalidTransition { .. })
        ));

        h.manager.initiate_payment(booked.id, submission(GOOD_CARD)).await.unwrap();
        let completed = h.manager.mark_completed(booked.id).await.unwrap();
        assert_eq!(completed.status, ReservationStatus::Completed);

        // Terminal states cannot be cancelled
        assert!(matches!(h.manager.cancel(booked.id).await, Err(CoreError::InvalidTransition { .. })));

        let other = h.manager.submit_booking(draft(1)).await.unwrap().reservation;
        assert_eq!(h.manager.cancel(other.id).await.unwrap().status, ReservationStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_merges_details_and_rejects_confirm() {
        let h = harness();
        let booked = h.manager.submit_booking(draft(2)).await.unwrap().reservation;

        let details = ReservationUpdate {
            customer_phone: Some("+90 555 999 9999".to_string()),
            ..Default::default()
        };
        let updated = h.manager.update(booked.id, details, None).await.unwrap();
        assert_eq!(updated.customer_phone, "+90 555 999 9999");
        assert_eq!(updated.price, booked.price);

        let err = h
            .manager
            .update(booked.id, ReservationUpdate::default(), Some(ReservationStatus::Confirmed))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(h.manager.get(booked.id).await.unwrap().status, ReservationStatus::Pending);
    }
}
