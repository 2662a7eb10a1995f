use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use goldenvan_catalog::{parse_booking_date, FareRequest, PriceBreakdown, MAX_DISTANCE_KM};
use goldenvan_core::{CoreError, Coordinates};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub vehicle_type: Option<String>,
    /// Kilometers.
    pub distance: Option<f64>,
    pub date: Option<String>,
    pub passengers: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DistanceRequest {
    pub origin: Coordinates,
    pub destination: Coordinates,
}

#[derive(Debug, Serialize)]
pub struct DistanceResponse {
    /// Kilometers.
    pub distance: Decimal,
    /// Minutes.
    pub duration: Decimal,
    pub unit: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pricing", post(quote))
        .route("/distance", post(distance))
}

/// POST /pricing
async fn quote(
    State(state): State<AppState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<PriceBreakdown>, AppError> {
    let Json(req) = payload?;

    let (Some(vehicle_type), Some(distance), Some(date), Some(passengers)) =
        (req.vehicle_type, req.distance, req.date, req.passengers)
    else {
        return Err(AppError::ValidationError(
            "vehicleType, distance, date and passengers are required".to_string(),
        ));
    };

    let distance_km = Decimal::try_from(distance)
        .ok()
        .filter(|km| *km >= Decimal::ZERO && *km <= MAX_DISTANCE_KM)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid distance {}", distance)))?;
    let booking_date = parse_booking_date(&date).map_err(CoreError::from)?;

    let breakdown = state
        .reservations
        .quote(&FareRequest { vehicle_type, distance_km, booking_date, passengers })
        .await?;
    Ok(Json(breakdown))
}

/// POST /distance
async fn distance(
    State(state): State<AppState>,
    payload: Result<Json<DistanceRequest>, JsonRejection>,
) -> Result<Json<DistanceResponse>, AppError> {
    let Json(req) = payload?;
    let estimate = state.reservations.resolve_distance(req.origin, req.destination).await?;

    Ok(Json(DistanceResponse {
        distance: estimate.kilometers(),
        duration: estimate.minutes(),
        unit: "km",
    }))
}
