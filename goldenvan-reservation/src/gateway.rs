use async_trait::async_trait;
use goldenvan_core::payment::{ChargeRequest, ChargeResponse, GatewayError, PaymentGateway};
use goldenvan_core::PaymentOutcome;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// In-process gateway for development and tests.
///
/// Approves every card except the configured declined numbers. Can be switched offline or
/// slowed down to exercise transport failures.
pub struct MockPaymentGateway {
    declined_cards: HashSet<String>,
    available: AtomicBool,
    latency: Duration,
    charges: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new(declined_cards: impl IntoIterator<Item = String>) -> Self {
        Self {
            declined_cards: declined_cards.into_iter().map(|c| normalize_card(&c)).collect(),
            available: AtomicBool::new(true),
            latency: Duration::ZERO,
            charges: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Charges that reached the provider, declined ones included.
    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn normalize_card(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("mock gateway offline".to_string()));
        }
        let charge = self.charges.fetch_add(1, Ordering::SeqCst) + 1;

        // Unique per charge, like a real provider transaction id
        let provider_id = format!("mock_{}_{}", request.payment_id.simple(), charge);
        let declined = self
            .declined_cards
            .contains(&normalize_card(request.card.card_number.expose()));

        let (outcome, raw) = if declined {
            (
                PaymentOutcome::Failure,
                json!({ "status": "failure", "paymentId": provider_id, "errorMessage": "Card declined" }),
            )
        } else {
            (
                PaymentOutcome::Success,
                json!({ "status": "success", "paymentId": provider_id, "paidPrice": request.amount }),
            )
        };

        debug!("Mock charge {} for reservation {}: {}", provider_id, request.reservation_id, outcome);
        Ok(ChargeResponse { provider_id, outcome, raw })
    }
}

/// Provider request body, iyzipay-shaped.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderPaymentRequest<'a> {
    locale: &'static str,
    conversation_id: String,
    price: String,
    paid_price: String,
    currency: &'a str,
    installment: u32,
    basket_id: String,
    payment_channel: &'static str,
    payment_group: &'static str,
    payment_card: ProviderCard<'a>,
    buyer: &'a goldenvan_core::payment::Buyer,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderCard<'a> {
    card_holder_name: &'a str,
    card_number: &'a str,
    expire_month: &'a str,
    expire_year: &'a str,
    cvc: &'a str,
    register_card: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderPaymentResponse {
    status: String,
    payment_id: Option<String>,
    error_message: Option<String>,
}

/// Gateway speaking JSON over HTTPS to the payment provider (or a signing proxy in front
/// of it).
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        let amount = format!("{:.2}", request.amount);
        let body = ProviderPaymentRequest {
            locale: "tr",
            conversation_id: request.payment_id.to_string(),
            price: amount.clone(),
            paid_price: amount,
            currency: &request.currency,
            installment: 1,
            basket_id: request.reservation_id.to_string(),
            payment_channel: "WEB",
            payment_group: "PRODUCT",
            payment_card: ProviderCard {
                card_holder_name: &request.card.card_holder_name,
                card_number: request.card.card_number.expose(),
                expire_month: &request.card.expire_month,
                expire_year: &request.card.expire_year,
                cvc: request.card.cvc.expose(),
                register_card: 0,
            },
            buyer: &request.buyer,
        };

        let response = self
            .client
            .post(format!("{}/payment/auth", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            warn!("Payment provider returned {} for payment {}", status, request.payment_id);
            return Err(GatewayError::Unavailable(format!("provider responded {}", status)));
        }

        let raw: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::InvalidResponse(e.to_string())
            }
        })?;
        let parsed: ProviderPaymentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let outcome = match parsed.status.as_str() {
            "success" => PaymentOutcome::Success,
            "failure" => PaymentOutcome::Failure,
            other => {
                return Err(GatewayError::InvalidResponse(format!("unexpected status '{}'", other)));
            }
        };

        if let Some(message) = &parsed.error_message {
            debug!("Provider declined payment {}: {}", request.payment_id, message);
        }

        Ok(ChargeResponse {
            provider_id: parsed.payment_id.unwrap_or_else(|| request.payment_id.to_string()),
            outcome,
            raw,
        })
    }
}
