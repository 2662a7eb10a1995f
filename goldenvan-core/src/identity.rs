use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CoreResult;

pub const ROLE_ADMIN: &str = "admin";

/// Back-office account allowed to sign in to the admin panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> CoreResult<Option<UserAccount>>;
}
