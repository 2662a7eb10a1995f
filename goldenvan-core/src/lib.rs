pub mod distance;
pub mod identity;
pub mod models;
pub mod payment;
pub mod repository;

pub use models::{
    Coordinates, Location, NewReservation, PaymentOutcome, PaymentRecord, PaymentRecordStatus,
    PaymentResolution, PaymentStatus, Reservation, ReservationFilter, ReservationStatus,
    ReservationUpdate, Vehicle,
};
pub use repository::Settlement;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid vehicle: {0}")]
    InvalidVehicle(String),
    #[error("Passenger count {passengers} exceeds vehicle capacity {capacity}")]
    CapacityExceeded { passengers: u32, capacity: u32 },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Reservation already finalized: {0}")]
    AlreadyFinalized(String),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("Distance service unavailable: {0}")]
    DistanceUnavailable(String),
    #[error("Unknown payment: {0}")]
    UnknownPayment(String),
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// Whether the caller may resubmit the same request later.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::GatewayUnavailable(_) | Self::DistanceUnavailable(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
