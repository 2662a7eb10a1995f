use chrono::{Datelike, NaiveDate};
use goldenvan_core::{CoreError, Vehicle};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_CURRENCY: &str = "TRY";

/// Upper bound on a priced route, in kilometers.
pub const MAX_DISTANCE_KM: Decimal = Decimal::from_parts(20_000, 0, 0, false, 0);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PricingError {
    #[error("Invalid vehicle type: {0}")]
    InvalidVehicle(String),

    #[error("Passenger count {passengers} exceeds vehicle capacity {capacity}")]
    CapacityExceeded { passengers: u32, capacity: u32 },

    #[error("Passenger count must be at least 1")]
    NoPassengers,

    #[error("Distance must be between 0 and 20000 kilometers, got {0}")]
    InvalidDistance(Decimal),

    #[error("Invalid booking date: {0}")]
    InvalidDate(String),

    #[error("Invalid booking time: {0}")]
    InvalidTime(String),

    #[error("Invalid seasonal multiplier table: {0}")]
    InvalidSeasonalTable(String),
}

impl From<PricingError> for CoreError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidVehicle(vehicle_type) => CoreError::InvalidVehicle(vehicle_type),
            PricingError::CapacityExceeded { passengers, capacity } => {
                CoreError::CapacityExceeded { passengers, capacity }
            }
            other => CoreError::Validation(other.to_string()),
        }
    }
}

/// Month-indexed price multipliers, January = 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonalTable {
    months: [Option<Decimal>; 12],
}

impl SeasonalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `"0"`..`"11"` keyed map used in configuration and stored settings.
    pub fn from_months(entries: &HashMap<String, f64>) -> Result<Self, PricingError> {
        let mut table = Self::new();
        for (key, value) in entries {
            let month0: usize = key
                .trim()
                .parse()
                .map_err(|_| PricingError::InvalidSeasonalTable(format!("month key '{}'", key)))?;
            let multiplier = Decimal::try_from(*value)
                .map_err(|_| PricingError::InvalidSeasonalTable(format!("multiplier {} for month {}", value, key)))?;
            table.set(month0, multiplier)?;
        }
        Ok(table)
    }

    pub fn set(&mut self, month0: usize, multiplier: Decimal) -> Result<(), PricingError> {
        if month0 >= 12 {
            return Err(PricingError::InvalidSeasonalTable(format!("month index {} out of range", month0)));
        }
        if multiplier <= Decimal::ZERO {
            return Err(PricingError::InvalidSeasonalTable(format!(
                "multiplier {} for month {} must be positive",
                multiplier, month0
            )));
        }
        self.months[month0] = Some(multiplier);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.months.iter().all(Option::is_none)
    }

    /// Multiplier for the calendar month of `date`; 1 when the month is unset.
    pub fn multiplier_for(&self, date: NaiveDate) -> Decimal {
        self.months[date.month0() as usize].unwrap_or(Decimal::ONE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub currency: String,
    pub seasonal: SeasonalTable,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            seasonal: SeasonalTable::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FareRequest {
    pub vehicle_type: String,
    pub distance_km: Decimal,
    pub booking_date: NaiveDate,
    pub passengers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub distance_price: Decimal,
    pub seasonal_multiplier: Decimal,
    pub total_price: Decimal,
    pub currency: String,
}

/// Half-away-from-zero to two decimal places.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Deterministic fare computation. Holds no I/O handles: the vehicle is looked up by the
/// caller and passed in.
#[derive(Debug, Clone)]
pub struct FareCalculator {
    config: PricingConfig,
}

impl FareCalculator {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn compute_price(
        &self,
        vehicle: Option<&Vehicle>,
        request: &FareRequest,
    ) -> Result<PriceBreakdown, PricingError> {
        let vehicle = vehicle
            .filter(|v| v.is_active && v.vehicle_type == request.vehicle_type)
            .ok_or_else(|| PricingError::InvalidVehicle(request.vehicle_type.clone()))?;

        if request.distance_km < Decimal::ZERO || request.distance_km > MAX_DISTANCE_KM {
            return Err(PricingError::InvalidDistance(request.distance_km));
        }
        if request.passengers == 0 {
            return Err(PricingError::NoPassengers);
        }
        if request.passengers > vehicle.capacity {
            return Err(PricingError::CapacityExceeded {
                passengers: request.passengers,
                capacity: vehicle.capacity,
            });
        }

        let overflow = || PricingError::InvalidDistance(request.distance_km);
        let distance_price = request
            .distance_km
            .checked_mul(vehicle.price_per_km)
            .ok_or_else(overflow)?
            .normalize();
        let seasonal_multiplier = self.config.seasonal.multiplier_for(request.booking_date);
        let total_price = vehicle
            .base_price
            .checked_add(distance_price)
            .and_then(|subtotal| subtotal.checked_mul(seasonal_multiplier))
            .map(round2)
            .ok_or_else(overflow)?;

        Ok(PriceBreakdown {
            base_price: vehicle.base_price,
            distance_price,
            seasonal_multiplier,
            total_price,
            currency: self.config.currency.clone(),
        })
    }
}
