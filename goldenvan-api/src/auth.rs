use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use goldenvan_core::identity::ROLE_ADMIN;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::auth::issue_token, state::AppState};

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(req) = payload?;

    let (username, password) = match (req.username, req.password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => return Err(AppError::ValidationError("Username and password are required".to_string())),
    };

    if let Some(dev) = &state.auth.dev_admin {
        if dev.username == username && dev.password == password {
            tracing::warn!("Development admin login used");
            let token = issue_token(&state.auth, "admin", ROLE_ADMIN)?;
            return Ok(Json(AuthResponse { token }));
        }
    }

    let invalid = || AppError::AuthenticationError("Invalid credentials".to_string());

    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(invalid)?;

    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Password check failed: {}", e)))?
        .unwrap_or(false);

    if !valid {
        tracing::info!("Failed login for {}", username);
        return Err(invalid());
    }

    let token = issue_token(&state.auth, &user.id, &user.role)?;
    Ok(Json(AuthResponse { token }))
}
