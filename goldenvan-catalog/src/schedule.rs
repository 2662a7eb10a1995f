use chrono::{NaiveDate, NaiveTime};

use crate::pricing::PricingError;

/// Parse the booking date as a timezone-naive calendar date.
///
/// Accepts `YYYY-MM-DD` or a timestamp that starts with one (`2025-07-01T23:30:00+03:00`).
/// The date is taken as written; no offset is applied, so the calendar month never shifts
/// across a timezone boundary.
pub fn parse_booking_date(input: &str) -> Result<NaiveDate, PricingError> {
    let trimmed = input.trim();
    let date_part = match trimmed.get(..10) {
        Some(head) if trimmed.len() == 10 => head,
        Some(head) if trimmed[10..].starts_with(['T', ' ']) => head,
        _ => return Err(PricingError::InvalidDate(input.to_string())),
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| PricingError::InvalidDate(input.to_string()))
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_booking_time(input: &str) -> Result<NaiveTime, PricingError> {
    let trimmed = input.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| PricingError::InvalidTime(input.to_string()))
}
