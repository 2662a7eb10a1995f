use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Json, Router,
};
use goldenvan_catalog::{parse_booking_date, parse_booking_time, PriceBreakdown};
use goldenvan_core::{
    CoreError, PaymentOutcome, PaymentStatus, Reservation, ReservationFilter, ReservationStatus, ReservationUpdate,
};
use goldenvan_reservation::{BookingDraft, PaymentSubmission};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{require_admin, require_token};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationResponse {
    pub id: Uuid,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub distance_km: rust_decimal::Decimal,
    #[serde(flatten)]
    pub price: PriceBreakdown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationQuery {
    pub id: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ReservationsResponse {
    One(Reservation),
    Many(Vec<Reservation>),
}

/// Fields an admin may send. Anything else, price included, is dropped on deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReservationRequest {
    pub id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub reservation_id: Uuid,
    pub payment_id: Uuid,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub payment_outcome: PaymentOutcome,
    pub transaction_id: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let signed_in = from_fn_with_state(state.clone(), require_token);
    let admin = from_fn_with_state(state, require_admin);

    Router::new()
        .route(
            "/reservations",
            post(create_reservation)
                .merge(get(get_reservations).route_layer(signed_in))
                .merge(
                    put(update_reservation)
                        .delete(delete_reservation)
                        .route_layer(admin.clone()),
                ),
        )
        .route("/reservations/{id}/payment", post(pay_reservation))
        .route(
            "/reservations/{id}/complete",
            post(complete_reservation).route_layer(admin.clone()),
        )
        .route(
            "/reservations/{id}/cancel",
            post(cancel_reservation).route_layer(admin),
        )
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::ValidationError(format!("Invalid reservation id '{}'", raw)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /reservations
async fn create_reservation(
    State(state): State<AppState>,
    payload: Result<Json<BookingDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateReservationResponse>), AppError> {
    let Json(draft) = payload?;
    let confirmation = state.reservations.submit_booking(draft).await?;
    let reservation = confirmation.reservation;

    tracing::info!("Reservation {} created at {} {}", reservation.id, reservation.price, reservation.currency);

    Ok((
        StatusCode::CREATED,
        Json(CreateReservationResponse {
            id: reservation.id,
            status: reservation.status,
            payment_status: reservation.payment_status,
            distance_km: reservation.distance_km,
            price: confirmation.price,
        }),
    ))
}

/// GET /reservations[?id=|?status=&paymentStatus=]
async fn get_reservations(
    State(state): State<AppState>,
    Query(query): Query<ReservationQuery>,
) -> Result<Json<ReservationsResponse>, AppError> {
    if let Some(id) = query.id.as_deref() {
        let reservation = state.reservations.get(parse_id(id)?).await?;
        return Ok(Json(ReservationsResponse::One(reservation)));
    }

    let filter = ReservationFilter {
        status: non_blank(query.status).map(|s| s.parse()).transpose()?,
        payment_status: non_blank(query.payment_status).map(|s| s.parse()).transpose()?,
    };
    let reservations = state.reservations.list(&filter).await?;
    Ok(Json(ReservationsResponse::Many(reservations)))
}

/// PUT /reservations
async fn update_reservation(
    State(state): State<AppState>,
    payload: Result<Json<UpdateReservationRequest>, JsonRejection>,
) -> Result<Json<Reservation>, AppError> {
    let Json(req) = payload?;
    let id = req
        .id
        .as_deref()
        .ok_or_else(|| AppError::ValidationError("Reservation ID is required".to_string()))
        .and_then(parse_id)?;

    let details = ReservationUpdate {
        customer_name: non_blank(req.customer_name),
        customer_email: non_blank(req.customer_email),
        customer_phone: non_blank(req.customer_phone),
        date: non_blank(req.date).map(|d| parse_booking_date(&d)).transpose().map_err(CoreError::from)?,
        time: non_blank(req.time).map(|t| parse_booking_time(&t)).transpose().map_err(CoreError::from)?,
    };
    let status: Option<ReservationStatus> = non_blank(req.status).map(|s| s.parse()).transpose()?;

    let reservation = state.reservations.update(id, details, status).await?;
    Ok(Json(reservation))
}

/// DELETE /reservations?id=
async fn delete_reservation(
    State(state): State<AppState>,
    Query(query): Query<ReservationQuery>,
) -> Result<Json<Value>, AppError> {
    let id = query
        .id
        .as_deref()
        .ok_or_else(|| AppError::ValidationError("Reservation ID is required".to_string()))
        .and_then(parse_id)?;

    state.reservations.delete(id).await?;
    Ok(Json(json!({ "message": "Reservation deleted successfully" })))
}

/// POST /reservations/{id}/payment
async fn pay_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PaymentSubmission>, JsonRejection>,
) -> Result<Json<PaymentResponse>, AppError> {
    let id = parse_id(&id)?;
    let Json(submission) = payload?;

    let attempt = state.reservations.initiate_payment(id, submission).await?;

    Ok(Json(PaymentResponse {
        reservation_id: attempt.reservation.id,
        payment_id: attempt.payment.id,
        status: attempt.reservation.status,
        payment_status: attempt.reservation.payment_status,
        payment_outcome: attempt.outcome,
        transaction_id: attempt.payment.transaction_id,
    }))
}

/// POST /reservations/{id}/complete
async fn complete_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.reservations.mark_completed(parse_id(&id)?).await?;
    Ok(Json(reservation))
}

/// POST /reservations/{id}/cancel
async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.reservations.cancel(parse_id(&id)?).await?;
    Ok(Json(reservation))
}
