use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::PushConfig,
    error::{AppError, Result},
    notify::{DeliveryOutcome, PushDelivery},
};

#[derive(Deserialize)]
struct PushResponse {
    delivered: bool,
    #[serde(default)]
    invalid_target: bool,
}

/// HTTP client for the push-delivery provider.
pub struct HttpPushClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPushClient {
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::External(format!("Push client init failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PushDelivery for HttpPushClient {
    async fn deliver(
        &self,
        target: &str,
        title: &str,
        body: &str,
        data: Value,
    ) -> Result<DeliveryOutcome> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&json!({
                "to": target,
                "title": title,
                "body": body,
                "data": data,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AppError::Transient(format!("Push provider unreachable: {}", e))
                } else {
                    AppError::External(format!("Push provider error: {}", e))
                }
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());

            return Ok(DeliveryOutcome {
                delivered: false,
                invalid_target: false,
                retry_after_secs,
            });
        }

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "Push provider rejected delivery: {}",
                response.status()
            )));
        }

        let parsed: PushResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Bad push provider response: {}", e)))?;

        Ok(DeliveryOutcome {
            delivered: parsed.delivered,
            invalid_target: parsed.invalid_target,
            retry_after_secs: None,
        })
    }
}
