pub mod app_config;
pub mod database;
pub mod memory;
pub mod payment_repo;
pub mod reservation_repo;
pub mod user_repo;
pub mod vehicle_repo;

pub use database::DbClient;
pub use memory::{
    default_fleet, InMemoryPaymentStore, InMemoryReservationStore, InMemoryUserStore,
    InMemoryVehicleCatalog,
};
pub use payment_repo::PgPaymentStore;
pub use reservation_repo::PgReservationStore;
pub use user_repo::PgUserStore;
pub use vehicle_repo::PgVehicleCatalog;
