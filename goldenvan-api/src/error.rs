use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use goldenvan_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{message}")]
    BadGateway { message: String, retriable: bool },
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::BadGateway { message, retriable } => {
                tracing::warn!("Upstream failure: {}", message);
                (StatusCode::BAD_GATEWAY, json!({ "error": message, "retriable": retriable }))
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error", "details": msg }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let retriable = err.is_retriable();
        match err {
            CoreError::Validation(_) | CoreError::InvalidVehicle(_) | CoreError::CapacityExceeded { .. } => {
                AppError::ValidationError(message)
            }
            CoreError::NotFound(_) | CoreError::UnknownPayment(_) => AppError::NotFoundError(message),
            CoreError::AlreadyFinalized(_) | CoreError::InvalidTransition { .. } => AppError::ConflictError(message),
            CoreError::GatewayUnavailable(_) | CoreError::DistanceUnavailable(_) => {
                AppError::BadGateway { message, retriable }
            }
            CoreError::Internal(detail) => AppError::InternalServerError(detail),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(format!("Invalid request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_status_mapping() {
        let cases = [
            (CoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::CapacityExceeded { passengers: 4, capacity: 3 }, StatusCode::BAD_REQUEST),
            (CoreError::InvalidVehicle("limo".into()), StatusCode::BAD_REQUEST),
            (CoreError::NotFound("r".into()), StatusCode::NOT_FOUND),
            (CoreError::UnknownPayment("p".into()), StatusCode::NOT_FOUND),
            (CoreError::AlreadyFinalized("r".into()), StatusCode::CONFLICT),
            (CoreError::InvalidTransition { from: "pending".into(), to: "completed".into() }, StatusCode::CONFLICT),
            (CoreError::GatewayUnavailable("down".into()), StatusCode::BAD_GATEWAY),
            (CoreError::DistanceUnavailable("down".into()), StatusCode::BAD_GATEWAY),
            (CoreError::Internal("pool timed out".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_upstream_failures_report_retriable_flag() {
        for err in [
            CoreError::GatewayUnavailable("timeout".into()),
            CoreError::DistanceUnavailable("quota".into()),
        ] {
            assert!(err.is_retriable());
            let response = AppError::from(err).into_response();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["retriable"], true);
        }

        let response = AppError::BadGateway { message: "rejected".into(), retriable: false }.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["retriable"], false);
    }
}
