use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

pub mod dispatcher;
pub mod push_client;

pub use dispatcher::{BulkReport, NotificationDispatcher};
pub use push_client::HttpPushClient;

/// What the delivery collaborator reported for one push attempt.
#[derive(Debug, Clone, Default)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    /// The target token is permanently dead and must be pruned.
    pub invalid_target: bool,
    /// Rate-limit hint: wait this many seconds before retrying the batch.
    pub retry_after_secs: Option<u64>,
}

/// The push-delivery collaborator. Implementations must distinguish an
/// invalid target (prune it) from a transient failure (leave it alone).
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn deliver(
        &self,
        target: &str,
        title: &str,
        body: &str,
        data: Value,
    ) -> crate::error::Result<DeliveryOutcome>;
}

/// Request to notify a set of users about one piece of content. Ephemeral;
/// the durable notification record is owned by the campaign subsystem.
#[derive(Debug, Clone)]
pub struct NotificationIntent {
    pub movie_id: Uuid,
    pub movie_title: String,
    pub title: String,
    pub body: String,
}
