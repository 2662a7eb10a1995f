use async_trait::async_trait;
use goldenvan_core::repository::VehicleCatalog;
use goldenvan_core::{CoreError, CoreResult, Vehicle};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgVehicleCatalog {
    pool: PgPool,
}

impl PgVehicleCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    name: String,
    vehicle_type: String,
    capacity: i32,
    base_price: Decimal,
    price_per_km: Decimal,
    features: Option<Vec<String>>,
    image: Option<String>,
    is_active: bool,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Vehicle {
            id: row.id,
            name: row.name,
            vehicle_type: row.vehicle_type,
            capacity: row.capacity.max(0) as u32,
            base_price: row.base_price,
            price_per_km: row.price_per_km,
            features: row.features.unwrap_or_default(),
            image: row.image,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl VehicleCatalog for PgVehicleCatalog {
    async fn find_by_type(&self, vehicle_type: &str) -> CoreResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT id, name, vehicle_type, capacity, base_price, price_per_km, features, image, is_active
            FROM vehicles
            WHERE vehicle_type = $1
            "#,
        )
        .bind(vehicle_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::internal)?;

        Ok(row.map(Vehicle::from))
    }

    async fn list(&self, active_only: bool) -> CoreResult<Vec<Vehicle>> {
        let rows = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT id, name, vehicle_type, capacity, base_price, price_per_km, features, image, is_active
            FROM vehicles
            WHERE ($1 = FALSE OR is_active = TRUE)
            ORDER BY capacity ASC, base_price ASC
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::internal)?;

        Ok(rows.into_iter().map(Vehicle::from).collect())
    }
}
