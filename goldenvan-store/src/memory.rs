//! Process-local stores used by the `memory` storage backend and by tests.
//!
//! Each store keeps its map behind a single `RwLock`; every compare-and-set runs entirely
//! under the write guard so concurrent callers observe one linear order per record.

use async_trait::async_trait;
use chrono::Utc;
use goldenvan_core::identity::{UserAccount, UserStore};
use goldenvan_core::repository::{PaymentStore, ReservationStore, VehicleCatalog};
use goldenvan_core::{
    CoreError, CoreResult, NewReservation, PaymentRecord, PaymentRecordStatus, PaymentResolution,
    PaymentStatus, Reservation, ReservationFilter, ReservationStatus, ReservationUpdate,
    Settlement, Vehicle,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryReservationStore {
    reservations: RwLock<HashMap<Uuid, Reservation>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn reservation_not_found(id: Uuid) -> CoreError {
    CoreError::NotFound(format!("reservation {}", id))
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn create(&self, new: NewReservation) -> CoreResult<Reservation> {
        let reservation = Reservation::create(new, Utc::now());
        let mut reservations = self.reservations.write().await;
        reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn get(&self, id: Uuid) -> CoreResult<Reservation> {
        self.reservations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| reservation_not_found(id))
    }

    async fn list(&self, filter: &ReservationFilter) -> CoreResult<Vec<Reservation>> {
        let reservations = self.reservations.read().await;
        let mut matching: Vec<Reservation> = reservations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        expected: &[ReservationStatus],
    ) -> CoreResult<Reservation> {
        let mut reservations = self.reservations.write().await;
        let reservation = reservations.get_mut(&id).ok_or_else(|| reservation_not_found(id))?;

        if status == ReservationStatus::Confirmed || !expected.contains(&reservation.status) {
            return Err(CoreError::InvalidTransition {
                from: reservation.status.to_string(),
                to: status.to_string(),
            });
        }

        reservation.status = status;
        reservation.updated_at = Utc::now();
        Ok(reservation.clone())
    }

    async fn update_payment(&self, id: Uuid, payment_status: PaymentStatus) -> CoreResult<Reservation> {
        let mut reservations = self.reservations.write().await;
        let reservation = reservations.get_mut(&id).ok_or_else(|| reservation_not_found(id))?;

        let refused = match payment_status {
            PaymentStatus::Pending => true,
            PaymentStatus::Failed => reservation.payment_status == PaymentStatus::Paid,
            PaymentStatus::Paid => false,
        };
        if refused {
            return Err(CoreError::InvalidTransition {
                from: format!("payment {}", reservation.payment_status),
                to: format!("payment {}", payment_status),
            });
        }

        reservation.payment_status = payment_status;
        if payment_status == PaymentStatus::Paid && reservation.status == ReservationStatus::Pending {
            reservation.status = ReservationStatus::Confirmed;
        }
        reservation.updated_at = Utc::now();
        Ok(reservation.clone())
    }

    async fn update_details(&self, id: Uuid, update: &ReservationUpdate) -> CoreResult<Reservation> {
        let mut reservations = self.reservations.write().await;
        let reservation = reservations.get_mut(&id).ok_or_else(|| reservation_not_found(id))?;
        reservation.apply_update(update, Utc::now());
        Ok(reservation.clone())
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        self.reservations
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| reservation_not_found(id))
    }
}

#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<HashMap<Uuid, PaymentRecord>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn open_attempt(
        &self,
        reservation_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> CoreResult<PaymentRecord> {
        let mut payments = self.payments.write().await;
        let now = Utc::now();

        if let Some(existing) = payments.values_mut().find(|p| p.reservation_id == reservation_id) {
            if existing.status == PaymentRecordStatus::Success {
                return Err(CoreError::AlreadyFinalized(format!(
                    "reservation {} has already been paid",
                    reservation_id
                )));
            }
            existing.reopen(amount, currency, now);
            return Ok(existing.clone());
        }

        let record = PaymentRecord::open(reservation_id, amount, currency, now);
        payments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<PaymentRecord>> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn find_by_reservation(&self, reservation_id: Uuid) -> CoreResult<Option<PaymentRecord>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.reservation_id == reservation_id)
            .cloned())
    }

    async fn settle(&self, id: Uuid, resolution: &PaymentResolution) -> CoreResult<Settlement> {
        let mut payments = self.payments.write().await;
        let record = payments
            .get_mut(&id)
            .ok_or_else(|| CoreError::UnknownPayment(id.to_string()))?;

        if record.is_superseded(resolution.transaction_id.as_deref()) {
            return Ok(Settlement::Superseded(record.clone()));
        }
        if record.status != PaymentRecordStatus::Pending {
            return Ok(Settlement::AlreadySettled(record.clone()));
        }

        record.settle(resolution, Utc::now());
        Ok(Settlement::Applied(record.clone()))
    }
}

pub struct InMemoryVehicleCatalog {
    vehicles: RwLock<Vec<Vehicle>>,
}

impl InMemoryVehicleCatalog {
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self { vehicles: RwLock::new(vehicles) }
    }

    /// Insert or replace by vehicle type.
    pub async fn upsert(&self, vehicle: Vehicle) {
        let mut vehicles = self.vehicles.write().await;
        vehicles.retain(|v| v.vehicle_type != vehicle.vehicle_type);
        vehicles.push(vehicle);
    }
}

impl Default for InMemoryVehicleCatalog {
    fn default() -> Self {
        Self::new(default_fleet())
    }
}

#[async_trait]
impl VehicleCatalog for InMemoryVehicleCatalog {
    async fn find_by_type(&self, vehicle_type: &str) -> CoreResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .await
            .iter()
            .find(|v| v.vehicle_type == vehicle_type)
            .cloned())
    }

    async fn list(&self, active_only: bool) -> CoreResult<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self
            .vehicles
            .read()
            .await
            .iter()
            .filter(|v| !active_only || v.is_active)
            .cloned()
            .collect();
        vehicles.sort_by(|a, b| a.capacity.cmp(&b.capacity).then(a.base_price.cmp(&b.base_price)));
        Ok(vehicles)
    }
}

/// The fleet seeded by the initial migration.
pub fn default_fleet() -> Vec<Vehicle> {
    let vehicle = |name: &str, vehicle_type: &str, capacity: u32, base: i64, per_km: i64, features: &[&str]| Vehicle {
        id: Uuid::new_v4(),
        name: name.to_string(),
        vehicle_type: vehicle_type.to_string(),
        capacity,
        base_price: Decimal::from(base),
        price_per_km: Decimal::from(per_km),
        features: features.iter().map(|f| f.to_string()).collect(),
        image: None,
        is_active: true,
    };

    vec![
        vehicle("Sedan", "sedan", 3, 500, 5, &["Air conditioning", "Wi-Fi"]),
        vehicle("Minivan", "minivan", 7, 750, 7, &["Air conditioning", "Wi-Fi", "Extra luggage"]),
        vehicle("Sprinter", "sprinter", 14, 1200, 10, &["Air conditioning", "Wi-Fi", "Extra luggage", "Group seating"]),
    ]
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserAccount>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account: UserAccount) {
        self.users.write().await.insert(account.username.clone(), account);
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> CoreResult<Option<UserAccount>> {
        Ok(self.users.read().await.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use goldenvan_core::{Coordinates, Location, PaymentOutcome};
    use std::sync::Arc;

    fn new_reservation() -> NewReservation {
        let location = |address: &str| Location {
            address: address.to_string(),
            coordinates: Coordinates { lat: 41.0, lng: 29.0 },
        };
        NewReservation {
            customer_name: "Mehmet Kaya".to_string(),
            customer_email: "mehmet@example.com".to_string(),
            customer_phone: "+90 555 222 3344".to_string(),
            pickup_location: location("Sabiha Gokcen Airport"),
            dropoff_location: location("Kadikoy"),
            date: NaiveDate::from_ymd_opt(2025, 5, 10).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            passengers: 2,
            vehicle_type: "sedan".to_string(),
            distance_km: Decimal::from(20),
            price: Decimal::from(600),
            currency: "TRY".to_string(),
        }
    }

    fn success() -> PaymentResolution {
        PaymentResolution {
            outcome: PaymentOutcome::Success,
            transaction_id: Some("tx-1".to_string()),
            raw: None,
        }
    }

    #[tokio::test]
    async fn test_paid_confirms_pending_reservation() {
        let store = InMemoryReservationStore::new();
        let created = store.create(new_reservation()).await.unwrap();

        let paid = store.update_payment(created.id, PaymentStatus::Paid).await.unwrap();
        assert_eq!(paid.status, ReservationStatus::Confirmed);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.price, created.price);
    }

    #[tokio::test]
    async fn test_failed_never_overwrites_paid() {
        let store = InMemoryReservationStore::new();
        let created = store.create(new_reservation()).await.unwrap();
        store.update_payment(created.id, PaymentStatus::Paid).await.unwrap();

        let err = store.update_payment(created.id, PaymentStatus::Failed).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(store.get(created.id).await.unwrap().payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_paid_keeps_cancelled_status() {
        let store = InMemoryReservationStore::new();
        let created = store.create(new_reservation()).await.unwrap();
        store
            .update_status(created.id, ReservationStatus::Cancelled, &[ReservationStatus::Pending])
            .await
            .unwrap();

        let paid = store.update_payment(created.id, PaymentStatus::Paid).await.unwrap();
        assert_eq!(paid.status, ReservationStatus::Cancelled);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let store = InMemoryReservationStore::new();
        let created = store.create(new_reservation()).await.unwrap();

        let err = store
            .update_status(created.id, ReservationStatus::Confirmed, &[ReservationStatus::Pending])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        let err = store
            .update_status(created.id, ReservationStatus::Completed, &[ReservationStatus::Confirmed])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        let missing = store
            .update_status(Uuid::new_v4(), ReservationStatus::Cancelled, &[ReservationStatus::Pending])
            .await
            .unwrap_err();
        assert!(matches!(missing, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let store = InMemoryReservationStore::new();
        let first = store.create(new_reservation()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create(new_reservation()).await.unwrap();
        store.update_payment(second.id, PaymentStatus::Paid).await.unwrap();

        let all = store.list(&ReservationFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let paid = store
            .list(&ReservationFilter { status: None, payment_status: Some(PaymentStatus::Paid) })
            .await
            .unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].id, second.id);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = InMemoryReservationStore::new();
        let created = store.create(new_reservation()).await.unwrap();
        store.delete(created.id).await.unwrap();
        assert!(matches!(store.delete(created.id).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_payment_record_reused_across_attempts() {
        let store = InMemoryPaymentStore::new();
        let reservation_id = Uuid::new_v4();

        let first = store.open_attempt(reservation_id, Decimal::from(600), "TRY").await.unwrap();
        store
            .settle(
                first.id,
                &PaymentResolution { outcome: PaymentOutcome::Failure, transaction_id: None, raw: None },
            )
            .await
            .unwrap();

        let second = store.open_attempt(reservation_id, Decimal::from(600), "TRY").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.attempts, 2);
        assert_eq!(second.status, PaymentRecordStatus::Pending);

        store.settle(second.id, &success()).await.unwrap();
        let err = store.open_attempt(reservation_id, Decimal::from(600), "TRY").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyFinalized(_)));
    }

    #[tokio::test]
    async fn test_settle_refuses_superseded_transaction() {
        let store = InMemoryPaymentStore::new();
        let reservation_id = Uuid::new_v4();
        let declined = PaymentResolution {
            outcome: PaymentOutcome::Failure,
            transaction_id: Some("tx-1".to_string()),
            raw: None,
        };

        let first = store.open_attempt(reservation_id, Decimal::from(600), "TRY").await.unwrap();
        store.settle(first.id, &declined).await.unwrap();
        let reopened = store.open_attempt(reservation_id, Decimal::from(600), "TRY").await.unwrap();
        assert_eq!(reopened.superseded_transaction_ids, vec!["tx-1".to_string()]);

        match store.settle(reopened.id, &declined).await.unwrap() {
            Settlement::Superseded(record) => assert_eq!(record.status, PaymentRecordStatus::Pending),
            other => panic!("expected superseded, got {:?}", other),
        }
        let retried = PaymentResolution {
            transaction_id: Some("tx-2".to_string()),
            ..success()
        };
        assert!(matches!(store.settle(reopened.id, &retried).await.unwrap(), Settlement::Applied(_)));
    }

    #[tokio::test]
    async fn test_first_settlement_wins() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let record = store.open_attempt(Uuid::new_v4(), Decimal::from(600), "TRY").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let outcome = if i % 2 == 0 { PaymentOutcome::Success } else { PaymentOutcome::Failure };
            handles.push(tokio::spawn(async move {
                store
                    .settle(record.id, &PaymentResolution { outcome, transaction_id: None, raw: None })
                    .await
                    .unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Settlement::Applied(_)) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_settle_unknown_payment() {
        let store = InMemoryPaymentStore::new();
        let err = store.settle(Uuid::new_v4(), &success()).await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownPayment(_)));
    }

    #[tokio::test]
    async fn test_vehicle_catalog_active_filter() {
        let catalog = InMemoryVehicleCatalog::default();
        let mut retired = default_fleet().remove(2);
        retired.is_active = false;
        catalog.upsert(retired).await;

        assert_eq!(catalog.list(false).await.unwrap().len(), 3);
        let active = catalog.list(true).await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].vehicle_type, "sedan");
        assert!(catalog.find_by_type("sprinter").await.unwrap().is_some());
        assert!(catalog.find_by_type("limo").await.unwrap().is_none());
    }
}
