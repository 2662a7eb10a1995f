use async_trait::async_trait;
use goldenvan_shared::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PaymentOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub card_holder_name: String,
    pub card_number: Masked<String>,
    pub expire_month: String,
    pub expire_year: String,
    pub cvc: Masked<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
    pub name: String,
    #[serde(default)]
    pub surname: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// A charge for the authoritative reservation price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    /// Our payment record id, echoed back by the provider in webhooks.
    pub payment_id: Uuid,
    pub reservation_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub card: CardDetails,
    pub buyer: Buyer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResponse {
    pub provider_id: String,
    pub outcome: PaymentOutcome,
    pub raw: serde_json::Value,
}

/// Transport-level failure. A declined card is a `ChargeResponse` with a `Failure` outcome,
/// never one of these.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unavailable(String),
    #[error("gateway timed out")]
    Timeout,
    #[error("unreadable gateway response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError>;
}
