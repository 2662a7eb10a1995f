use anyhow::{anyhow, Context};
use goldenvan_api::{app, state::{AppState, AuthConfig, DevAdmin}};
use goldenvan_catalog::{FareCalculator, PricingConfig, SeasonalTable};
use goldenvan_core::distance::DistanceResolver;
use goldenvan_core::identity::UserStore;
use goldenvan_core::payment::PaymentGateway;
use goldenvan_core::repository::{PaymentStore, ReservationStore, VehicleCatalog};
use goldenvan_reservation::{
    GoogleDistanceResolver, HttpPaymentGateway, MockPaymentGateway, ReservationManager,
    StaticDistanceResolver, Timeouts, WebhookReconciler,
};
use goldenvan_store::app_config::{Config, DistanceProvider, PaymentProvider, PricingSettings, StorageBackend};
use goldenvan_store::{
    DbClient, InMemoryPaymentStore, InMemoryReservationStore, InMemoryUserStore, InMemoryVehicleCatalog,
    PgPaymentStore, PgReservationStore, PgUserStore, PgVehicleCatalog,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Stores {
    reservations: Arc<dyn ReservationStore>,
    payments: Arc<dyn PaymentStore>,
    vehicles: Arc<dyn VehicleCatalog>,
    users: Arc<dyn UserStore>,
    pricing: PricingSettings,
}

async fn build_stores(config: &Config) -> anyhow::Result<Stores> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            let pricing = match db.fetch_pricing_settings(config.pricing.clone()).await {
                Ok(pricing) => pricing,
                Err(e) => {
                    tracing::warn!("Could not read stored pricing settings, using file defaults: {}", e);
                    config.pricing.clone()
                }
            };

            Ok(Stores {
                reservations: Arc::new(PgReservationStore::new(db.pool.clone())),
                payments: Arc::new(PgPaymentStore::new(db.pool.clone())),
                vehicles: Arc::new(PgVehicleCatalog::new(db.pool.clone())),
                users: Arc::new(PgUserStore::new(db.pool.clone())),
                pricing,
            })
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; reservations are lost on restart");
            Ok(Stores {
                reservations: Arc::new(InMemoryReservationStore::new()),
                payments: Arc::new(InMemoryPaymentStore::new()),
                vehicles: Arc::new(InMemoryVehicleCatalog::default()),
                users: Arc::new(InMemoryUserStore::new()),
                pricing: config.pricing.clone(),
            })
        }
    }
}

fn build_gateway(config: &Config) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    let payment = &config.payment;
    let gateway: Arc<dyn PaymentGateway> = match payment.provider {
        PaymentProvider::Mock => {
            tracing::warn!("Payment provider is the in-process mock");
            Arc::new(MockPaymentGateway::new(payment.declined_cards.clone()))
        }
        PaymentProvider::Http => {
            let base_url = payment.base_url.clone().ok_or_else(|| anyhow!("payment.base_url is required"))?;
            let api_key = payment.api_key.clone().ok_or_else(|| anyhow!("payment.api_key is required"))?;
            Arc::new(HttpPaymentGateway::new(base_url, api_key, Duration::from_secs(payment.timeout_seconds))?)
        }
    };
    Ok(gateway)
}

fn build_distance(config: &Config) -> anyhow::Result<Arc<dyn DistanceResolver>> {
    let distance = &config.distance;
    let resolver: Arc<dyn DistanceResolver> = match distance.provider {
        DistanceProvider::Static => Arc::new(StaticDistanceResolver::new(
            distance.static_distance_meters,
            distance.static_duration_seconds,
        )),
        DistanceProvider::Google => {
            let api_key = distance.api_key.clone().ok_or_else(|| anyhow!("distance.api_key is required"))?;
            Arc::new(GoogleDistanceResolver::new(
                distance.base_url.clone(),
                api_key,
                Duration::from_secs(distance.timeout_seconds),
            )?)
        }
    };
    Ok(resolver)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "goldenvan_api=debug,goldenvan_reservation=debug,audit=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Golden Van API on port {}", config.server.port);

    let stores = build_stores(&config).await?;
    let seasonal = SeasonalTable::from_months(&stores.pricing.seasonal_multipliers)
        .context("Invalid seasonal multiplier table")?;
    let calculator = FareCalculator::new(PricingConfig {
        currency: stores.pricing.currency.clone(),
        seasonal,
    });

    let manager = Arc::new(
        ReservationManager::new(
            stores.reservations,
            stores.payments,
            stores.vehicles,
            build_gateway(&config)?,
            build_distance(&config)?,
            calculator,
        )
        .with_timeouts(Timeouts {
            gateway: Duration::from_secs(config.payment.timeout_seconds),
            distance: Duration::from_secs(config.distance.timeout_seconds),
        }),
    );

    let app_state = AppState {
        webhooks: Arc::new(WebhookReconciler::new(manager.clone())),
        reservations: manager,
        users: stores.users,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            dev_admin: config.auth.dev_admin.as_ref().map(|d| DevAdmin {
                username: d.username.clone(),
                password: d.password.clone(),
            }),
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
