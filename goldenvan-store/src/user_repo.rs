use async_trait::async_trait;
use goldenvan_core::identity::{UserAccount, UserStore};
use goldenvan_core::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    role: String,
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> CoreResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::internal)?;

        Ok(row.map(|r| UserAccount {
            id: r.id.to_string(),
            username: r.username,
            password_hash: r.password_hash,
            role: r.role,
        }))
    }
}
