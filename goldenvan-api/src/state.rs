use goldenvan_core::identity::UserStore;
use goldenvan_reservation::{ReservationManager, WebhookReconciler};
use std::sync::Arc;

#[derive(Clone)]
pub struct DevAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub dev_admin: Option<DevAdmin>,
}

#[derive(Clone)]
pub struct AppState {
    pub reservations: Arc<ReservationManager>,
    pub webhooks: Arc<WebhookReconciler>,
    pub users: Arc<dyn UserStore>,
    pub auth: AuthConfig,
}
