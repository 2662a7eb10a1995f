pub mod pricing;
pub mod schedule;

pub use pricing::{
    FareCalculator, FareRequest, PriceBreakdown, PricingConfig, PricingError, SeasonalTable,
    MAX_DISTANCE_KM,
};
pub use schedule::{parse_booking_date, parse_booking_time};
