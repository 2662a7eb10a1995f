use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    NewReservation, PaymentRecord, PaymentResolution, PaymentStatus, Reservation,
    ReservationFilter, ReservationStatus, ReservationUpdate, Vehicle,
};
use crate::CoreResult;

/// Persistence boundary for reservations.
///
/// Every mutation is atomic per reservation and refreshes `updated_at`. None of them can
/// change the price.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Insert a reservation at pending/pending with fresh timestamps.
    async fn create(&self, reservation: NewReservation) -> CoreResult<Reservation>;

    /// `NotFound` when absent.
    async fn get(&self, id: Uuid) -> CoreResult<Reservation>;

    /// Newest first.
    async fn list(&self, filter: &ReservationFilter) -> CoreResult<Vec<Reservation>>;

    /// Compare-and-set on the trip status: applies `status` only while the current status is
    /// one of `expected`, otherwise `InvalidTransition`. `Confirmed` is always refused here.
    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        expected: &[ReservationStatus],
    ) -> CoreResult<Reservation>;

    /// Apply a reconciled payment status.
    ///
    /// `Paid` also moves a pending reservation to confirmed. `Failed` never overwrites `Paid`,
    /// and `Pending` is refused.
    async fn update_payment(&self, id: Uuid, payment_status: PaymentStatus) -> CoreResult<Reservation>;

    /// Partial merge of the allow-listed fields.
    async fn update_details(&self, id: Uuid, update: &ReservationUpdate) -> CoreResult<Reservation>;

    async fn delete(&self, id: Uuid) -> CoreResult<()>;
}

/// Result of recording a payment outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The record was pending and now carries the outcome.
    Applied(PaymentRecord),
    /// The record had already settled; it is returned untouched.
    AlreadySettled(PaymentRecord),
    /// The outcome names a transaction from an earlier attempt; the record is returned untouched.
    Superseded(PaymentRecord),
}

impl Settlement {
    pub fn record(&self) -> &PaymentRecord {
        match self {
            Settlement::Applied(record)
            | Settlement::AlreadySettled(record)
            | Settlement::Superseded(record) => record,
        }
    }
}

/// Payment records, at most one per reservation.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Open a pending attempt for the reservation, reusing its record if one exists.
    /// A record that already succeeded yields `AlreadyFinalized`.
    async fn open_attempt(
        &self,
        reservation_id: Uuid,
        amount: rust_decimal::Decimal,
        currency: &str,
    ) -> CoreResult<PaymentRecord>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<PaymentRecord>>;

    async fn find_by_reservation(&self, reservation_id: Uuid) -> CoreResult<Option<PaymentRecord>>;

    /// Record a terminal outcome if and only if the record is still pending and the outcome
    /// does not carry a superseded transaction id. Unknown ids yield `UnknownPayment`.
    async fn settle(&self, id: Uuid, resolution: &PaymentResolution) -> CoreResult<Settlement>;
}

/// Read-only view of the vehicle catalog.
#[async_trait]
pub trait VehicleCatalog: Send + Sync {
    async fn find_by_type(&self, vehicle_type: &str) -> CoreResult<Option<Vehicle>>;

    async fn list(&self, active_only: bool) -> CoreResult<Vec<Vehicle>>;
}
