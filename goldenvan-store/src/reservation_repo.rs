use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use goldenvan_core::repository::ReservationStore;
use goldenvan_core::{
    Coordinates, CoreError, CoreResult, Location, NewReservation, PaymentStatus, Reservation,
    ReservationFilter, ReservationStatus, ReservationUpdate,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    pickup_address: String,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_address: String,
    dropoff_lat: f64,
    dropoff_lng: f64,
    date: NaiveDate,
    time: NaiveTime,
    passengers: i32,
    vehicle_type: String,
    distance_km: Decimal,
    price: Decimal,
    currency: String,
    status: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = CoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation {
            id: row.id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            pickup_location: Location {
                address: row.pickup_address,
                coordinates: Coordinates { lat: row.pickup_lat, lng: row.pickup_lng },
            },
            dropoff_location: Location {
                address: row.dropoff_address,
                coordinates: Coordinates { lat: row.dropoff_lat, lng: row.dropoff_lng },
            },
            date: row.date,
            time: row.time,
            passengers: u32::try_from(row.passengers)
                .map_err(|_| CoreError::Internal(format!("negative passenger count on {}", row.id)))?,
            vehicle_type: row.vehicle_type,
            distance_km: row.distance_km,
            price: row.price,
            currency: row.currency,
            status: row.status.parse().map_err(CoreError::internal)?,
            payment_status: row.payment_status.parse().map_err(CoreError::internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn not_found(id: Uuid) -> CoreError {
    CoreError::NotFound(format!("reservation {}", id))
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn create(&self, new: NewReservation) -> CoreResult<Reservation> {
        let reservation = Reservation::create(new, Utc::now());

        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            INSERT INTO reservations (
                id, customer_name, customer_email, customer_phone,
                pickup_address, pickup_lat, pickup_lng,
                dropoff_address, dropoff_lat, dropoff_lng,
                date, time, passengers, vehicle_type, distance_km, price, currency,
                status, payment_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            RETURNING *
            "#,
        )
        .bind(reservation.id)
        .bind(&reservation.customer_name)
        .bind(&reservation.customer_email)
        .bind(&reservation.customer_phone)
        .bind(&reservation.pickup_location.address)
        .bind(reservation.pickup_location.coordinates.lat)
        .bind(reservation.pickup_location.coordinates.lng)
        .bind(&reservation.dropoff_location.address)
        .bind(reservation.dropoff_location.coordinates.lat)
        .bind(reservation.dropoff_location.coordinates.lng)
        .bind(reservation.date)
        .bind(reservation.time)
        .bind(reservation.passengers as i32)
        .bind(&reservation.vehicle_type)
        .bind(reservation.distance_km)
        .bind(reservation.price)
        .bind(&reservation.currency)
        .bind(reservation.status.as_str())
        .bind(reservation.payment_status.as_str())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::internal)?;

        row.try_into()
    }

    async fn get(&self, id: Uuid) -> CoreResult<Reservation> {
        let row = sqlx::query_as::<_, ReservationRow>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::internal)?
            .ok_or_else(|| not_found(id))?;

        row.try_into()
    }

    async fn list(&self, filter: &ReservationFilter) -> CoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT * FROM reservations
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR payment_status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.payment_status.map(|p| p.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::internal)?;

        rows.into_iter().map(Reservation::try_from).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        expected: &[ReservationStatus],
    ) -> CoreResult<Reservation> {
        if status == ReservationStatus::Confirmed {
            let current = self.get(id).await?;
            return Err(CoreError::InvalidTransition {
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            UPDATE reservations SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(expected)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::internal)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = self.get(id).await?;
                Err(CoreError::InvalidTransition {
                    from: current.status.to_string(),
                    to: status.to_string(),
                })
            }
        }
    }

    async fn update_payment(&self, id: Uuid, payment_status: PaymentStatus) -> CoreResult<Reservation> {
        let row = match payment_status {
            PaymentStatus::Pending => {
                let current = self.get(id).await?;
                return Err(CoreError::InvalidTransition {
                    from: format!("payment {}", current.payment_status),
                    to: "payment pending".to_string(),
                });
            }
            PaymentStatus::Paid => sqlx::query_as::<_, ReservationRow>(
                r#"
                UPDATE reservations
                SET payment_status = 'paid',
                    status = CASE WHEN status = 'pending' THEN 'confirmed' ELSE status END,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::internal)?,
            PaymentStatus::Failed => sqlx::query_as::<_, ReservationRow>(
                r#"
                UPDATE reservations SET payment_status = 'failed', updated_at = NOW()
                WHERE id = $1 AND payment_status <> 'paid'
                RETURNING *
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::internal)?,
        };

        match row {
            Some(row) => row.try_into(),
            None => {
                // Either missing or already paid
                let current = self.get(id).await?;
                Err(CoreError::InvalidTransition {
                    from: format!("payment {}", current.payment_status),
                    to: format!("payment {}", payment_status),
                })
            }
        }
    }

    async fn update_details(&self, id: Uuid, update: &ReservationUpdate) -> CoreResult<Reservation> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            UPDATE reservations
            SET customer_name = COALESCE($2, customer_name),
                customer_email = COALESCE($3, customer_email),
                customer_phone = COALESCE($4, customer_phone),
                date = COALESCE($5, date),
                time = COALESCE($6, time),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.customer_name.as_deref())
        .bind(update.customer_email.as_deref())
        .bind(update.customer_phone.as_deref())
        .bind(update.date)
        .bind(update.time)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::internal)?
        .ok_or_else(|| not_found(id))?;

        row.try_into()
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(CoreError::internal)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
