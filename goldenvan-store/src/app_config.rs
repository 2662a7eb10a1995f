use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub pricing: PricingSettings,
    pub payment: PaymentConfig,
    pub distance: DistanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_seconds: u64,
    /// Fixed admin login for local development. Leave unset in production.
    pub dev_admin: Option<DevAdminConfig>,
}

fn default_jwt_expiration() -> u64 { 24 * 60 * 60 }

#[derive(Debug, Deserialize, Clone)]
pub struct DevAdminConfig {
    pub username: String,
    pub password: String,
}

/// Raw pricing settings. Seasonal keys are month indexes `"0"`..`"11"`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PricingSettings {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub seasonal_multipliers: HashMap<String, f64>,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            seasonal_multipliers: HashMap::new(),
        }
    }
}

fn default_currency() -> String { "TRY".to_string() }

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Mock,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_external_timeout")]
    pub timeout_seconds: u64,
    /// Card numbers the mock provider declines.
    #[serde(default)]
    pub declined_cards: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceProvider {
    Google,
    Static,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DistanceConfig {
    pub provider: DistanceProvider,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_external_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub static_distance_meters: u64,
    #[serde(default)]
    pub static_duration_seconds: u64,
}

fn default_external_timeout() -> u64 { 10 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `GOLDENVAN__AUTH__JWT_SECRET=...` sets `auth.jwt_secret`
            .add_source(config::Environment::with_prefix("GOLDENVAN").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
