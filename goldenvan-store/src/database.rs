use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use serde_json::Value;

use crate::app_config::{DatabaseConfig, PricingSettings};

/// Process-wide connection pool. Stores borrow a connection per statement and hand it
/// back when the query future completes.
#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay the stored `pricing` setting on top of the file defaults.
    ///
    /// Expected shape: `{"currency": "TRY", "seasonalMultipliers": {"6": 1.25}}`.
    pub async fn fetch_pricing_settings(&self, defaults: PricingSettings) -> Result<PricingSettings, sqlx::Error> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT value FROM settings WHERE key = 'pricing'")
            .fetch_optional(&self.pool)
            .await?;

        let mut settings = defaults;
        let Some((value,)) = row else {
            return Ok(settings);
        };

        if let Some(currency) = value.get("currency").and_then(Value::as_str) {
            settings.currency = currency.to_string();
        }

        if let Some(months) = value.get("seasonalMultipliers").and_then(Value::as_object) {
            let mut parsed = std::collections::HashMap::new();
            for (month, multiplier) in months {
                match multiplier.as_f64() {
                    Some(m) => {
                        parsed.insert(month.clone(), m);
                    }
                    None => warn!("Ignoring non-numeric seasonal multiplier for month {}", month),
                }
            }
            settings.seasonal_multipliers = parsed;
        }

        Ok(settings)
    }
}
