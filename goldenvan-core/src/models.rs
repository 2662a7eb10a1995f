use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::CoreError;

/// Whether the trip itself is actionable. Independent of [`PaymentStatus`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::Validation(format!("unknown reservation status '{}'", other))),
        }
    }
}

/// Whether money has been captured for the reservation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!("unknown payment status '{}'", other))),
        }
    }
}

/// Business outcome of a charge as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Success,
    Failure,
}

impl PaymentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    /// Reservation payment status this outcome reconciles to.
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            Self::Success => PaymentStatus::Paid,
            Self::Failure => PaymentStatus::Failed,
        }
    }
}

impl fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            other => Err(CoreError::Validation(format!("unknown payment outcome '{}'", other))),
        }
    }
}

/// State of a payment record. `Pending` while a charge is in flight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentRecordStatus {
    Pending,
    Success,
    Failure,
}

impl PaymentRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    pub fn outcome(&self) -> Option<PaymentOutcome> {
        match self {
            Self::Pending => None,
            Self::Success => Some(PaymentOutcome::Success),
            Self::Failure => Some(PaymentOutcome::Failure),
        }
    }
}

impl From<PaymentOutcome> for PaymentRecordStatus {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Success => Self::Success,
            PaymentOutcome::Failure => Self::Failure,
        }
    }
}

impl fmt::Display for PaymentRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentRecordStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            other => Err(CoreError::Validation(format!("unknown payment record status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: String,
    pub coordinates: Coordinates,
}

/// A customer's booked transfer.
///
/// `price` is written once at creation from the fare calculator and no update path touches it.
/// `status == Confirmed` is only reachable through payment reconciliation and implies
/// `payment_status == Paid`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub pickup_location: Location,
    pub dropoff_location: Location,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub passengers: u32,
    pub vehicle_type: String,
    pub distance_km: Decimal,
    pub price: Decimal,
    pub currency: String,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Materialize a validated booking. Status fields always start at pending/pending.
    pub fn create(new: NewReservation, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_name: new.customer_name,
            customer_email: new.customer_email,
            customer_phone: new.customer_phone,
            pickup_location: new.pickup_location,
            dropoff_location: new.dropoff_location,
            date: new.date,
            time: new.time,
            passengers: new.passengers,
            vehicle_type: new.vehicle_type,
            distance_km: new.distance_km,
            price: new.price,
            currency: new.currency,
            status: ReservationStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the allow-listed fields of an admin update.
    pub fn apply_update(&mut self, update: &ReservationUpdate, now: DateTime<Utc>) {
        if let Some(name) = &update.customer_name {
            self.customer_name = name.clone();
        }
        if let Some(email) = &update.customer_email {
            self.customer_email = email.clone();
        }
        if let Some(phone) = &update.customer_phone {
            self.customer_phone = phone.clone();
        }
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(time) = update.time {
            self.time = time;
        }
        self.updated_at = now;
    }
}

/// Validated booking handed to the store.
///
/// Carries no status or payment fields, so a forged confirmation cannot reach `create`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub pickup_location: Location,
    pub dropoff_location: Location,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub passengers: u32,
    pub vehicle_type: String,
    pub distance_km: Decimal,
    pub price: Decimal,
    pub currency: String,
}

/// The fields an admin may change after creation. Price and status axes are not among them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservationUpdate {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl ReservationUpdate {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.customer_email.is_none()
            && self.customer_phone.is_none()
            && self.date.is_none()
            && self.time.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.status.map_or(true, |s| s == reservation.status)
            && self.payment_status.map_or(true, |p| p == reservation.payment_status)
    }
}

/// One record per reservation, reused across payment attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub status: PaymentRecordStatus,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_id: Option<String>,
    /// Provider transaction ids of earlier attempts on this record.
    #[serde(default)]
    pub superseded_transaction_ids: Vec<String>,
    pub attempts: u32,
    pub raw: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn open(reservation_id: Uuid, amount: Decimal, currency: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            status: PaymentRecordStatus::Pending,
            amount,
            currency: currency.to_string(),
            transaction_id: None,
            superseded_transaction_ids: Vec::new(),
            attempts: 1,
            raw: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a new attempt on an unsettled or failed record.
    pub fn reopen(&mut self, amount: Decimal, currency: &str, now: DateTime<Utc>) {
        self.status = PaymentRecordStatus::Pending;
        self.amount = amount;
        self.currency = currency.to_string();
        if let Some(previous) = self.transaction_id.take() {
            self.superseded_transaction_ids.push(previous);
        }
        self.raw = None;
        self.attempts += 1;
        self.updated_at = now;
    }

    /// Whether `transaction_id` belongs to an attempt this record has since moved past.
    pub fn is_superseded(&self, transaction_id: Option<&str>) -> bool {
        transaction_id.is_some_and(|tx| self.superseded_transaction_ids.iter().any(|old| old == tx))
    }

    pub fn settle(&mut self, resolution: &PaymentResolution, now: DateTime<Utc>) {
        self.status = resolution.outcome.into();
        self.transaction_id = resolution.transaction_id.clone();
        self.raw = resolution.raw.clone();
        self.updated_at = now;
    }
}

/// A terminal outcome to record against a pending payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentResolution {
    pub outcome: PaymentOutcome,
    pub transaction_id: Option<String>,
    pub raw: Option<serde_json::Value>,
}

/// Catalog entry consumed read-only by the fare calculator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub capacity: u32,
    pub base_price: Decimal,
    pub price_per_km: Decimal,
    #[serde(default)]
    pub features: Vec<String>,
    pub image: Option<String>,
    pub is_active: bool,
}
