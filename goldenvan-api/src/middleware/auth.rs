use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use goldenvan_core::identity::ROLE_ADMIN;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub fn issue_token(auth: &AuthConfig, user_id: &str, role: &str) -> Result<String, AppError> {
    let claims = Claims {
        user_id: user_id.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

pub fn verify_token(auth: &AuthConfig, headers: &HeaderMap) -> Result<Claims, AppError> {
    let token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    decode::<Claims>(
        token.trim(),
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))
}

/// Any signed-in user.
pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verify_token(&state.auth, req.headers())?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Signed-in user with the admin role.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verify_token(&state.auth, req.headers())?;
    if !claims.is_admin() {
        tracing::warn!("User {} with role {} denied admin action", claims.user_id, claims.role);
        return Err(AppError::AuthorizationError("Admin role required".to_string()));
    }
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth() -> AuthConfig {
        AuthConfig { secret: "test-secret".to_string(), expiration: 3600, dev_admin: None }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        headers
    }

    #[test]
    fn test_issued_token_round_trips() {
        let token = issue_token(&auth(), "user-1", "admin").unwrap();
        let claims = verify_token(&auth(), &bearer(&token)).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert!(claims.is_admin());
    }

    #[test]
    fn test_rejects_foreign_signature_and_missing_header() {
        let other = AuthConfig { secret: "other-secret".to_string(), ..auth() };
        let token = issue_token(&other, "user-1", "admin").unwrap();
        assert!(matches!(verify_token(&auth(), &bearer(&token)), Err(AppError::AuthenticationError(_))));
        assert!(matches!(verify_token(&auth(), &HeaderMap::new()), Err(AppError::AuthenticationError(_))));
    }

    #[test]
    fn test_rejects_expired_token() {
        let claims = Claims { user_id: "user-1".to_string(), role: "admin".to_string(), exp: 1_000 };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap();
        assert!(verify_token(&auth(), &bearer(&token)).is_err());
    }
}
