use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use goldenvan_core::Vehicle;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VehicleQuery {
    #[serde(default)]
    pub active: Option<bool>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/vehicles", get(list_vehicles))
}

/// GET /vehicles[?active=true]
async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehicleQuery>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let vehicles = state.reservations.vehicles(query.active.unwrap_or(false)).await?;
    Ok(Json(vehicles))
}
