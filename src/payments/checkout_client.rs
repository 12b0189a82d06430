use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::GatewayConfig,
    error::{AppError, Result},
    payments::{GatewayPaymentStatus, PaymentGateway},
};

#[derive(Deserialize)]
struct CheckoutResponse {
    checkout_ref: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

/// HTTP client for the hosted-checkout payment gateway.
pub struct HttpCheckoutClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCheckoutClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::External(format!("Gateway client init failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn map_request_error(e: reqwest::Error) -> AppError {
        if e.is_timeout() || e.is_connect() {
            AppError::Transient(format!("Gateway unreachable: {}", e))
        } else {
            AppError::External(format!("Gateway error: {}", e))
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpCheckoutClient {
    async fn create_checkout(
        &self,
        order_code: &str,
        amount_cents: i64,
        description: &str,
    ) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/checkouts", self.base_url))
            .json(&json!({
                "order_code": order_code,
                "amount_cents": amount_cents,
                "description": description,
            }))
            .send()
            .await
            .map_err(Self::map_request_error)?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "Gateway rejected checkout creation: {}",
                response.status()
            )));
        }

        let body: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Bad gateway response: {}", e)))?;

        Ok(body.checkout_ref)
    }

    async fn get_payment_status(&self, order_code: &str) -> Result<GatewayPaymentStatus> {
        let response = self
            .client
            .get(format!("{}/checkouts/{}/status", self.base_url, order_code))
            .send()
            .await
            .map_err(Self::map_request_error)?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "Gateway status lookup failed: {}",
                response.status()
            )));
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Bad gateway response: {}", e)))?;

        match body.status.as_str() {
            "pending" => Ok(GatewayPaymentStatus::Pending),
            "paid" => Ok(GatewayPaymentStatus::Paid),
            "failed" => Ok(GatewayPaymentStatus::Failed),
            other => Err(AppError::External(format!(
                "Unknown gateway status: {}",
                other
            ))),
        }
    }
}
