use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use uuid::Uuid;

use crate::{
    access,
    domain::Rental,
    error::{AppError, Result},
    notify::{NotificationIntent, PushDelivery},
    repository::{RentalRepository, UserRepository},
};

/// Delivery calls in flight at once during a bulk send. Keeps us inside the
/// provider's rate limits.
const PUSH_CONCURRENCY: usize = 8;
/// Attempts per target before a rate-limited delivery counts as failed.
const RATE_LIMIT_RETRY_BUDGET: u32 = 3;

#[derive(Debug, Default, Clone, Copy)]
pub struct BulkReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pruned_targets: usize,
}

pub struct NotificationDispatcher {
    rental_repo: Arc<dyn RentalRepository>,
    user_repo: Arc<dyn UserRepository>,
    push: Arc<dyn PushDelivery>,
}

impl NotificationDispatcher {
    pub fn new(
        rental_repo: Arc<dyn RentalRepository>,
        user_repo: Arc<dyn UserRepository>,
        push: Arc<dyn PushDelivery>,
    ) -> Self {
        Self {
            rental_repo,
            user_repo,
            push,
        }
    }

    /// Warn one rental's owner that access is about to lapse.
    ///
    /// The one-shot flag is claimed before anything is sent: once a sweep wins
    /// the flag, no later sweep can send a second warning for this rental. A
    /// delivery failure after the flag is claimed is reported but does not
    /// re-arm the flag, so the guarantee is at-most-once, not at-least-once.
    pub async fn process_expiring_rental(&self, rental: &Rental, movie_title: &str) -> Result<bool> {
        let now = Utc::now();
        let hours_left = access::remaining_hours(rental, now);

        if !self.rental_repo.mark_notice_sent(rental.id).await? {
            tracing::debug!(rental_id = %rental.id, "Expiry notice already claimed, skipping");
            return Ok(false);
        }

        let user = self
            .user_repo
            .find_by_id(rental.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !user.can_receive_push(now) {
            tracing::debug!(user_id = %user.id, rental_id = %rental.id, "User has no usable push target");
            return Ok(false);
        }
        let target = user.push_token.as_deref().unwrap_or_default();

        let title = "Your rental is about to expire".to_string();
        let body = format!(
            "\"{}\" expires in about {} hour{}. Finish watching before access ends.",
            movie_title,
            hours_left,
            if hours_left == 1 { "" } else { "s" }
        );
        let data = json!({
            "kind": "rental_expiry_warning",
            "movie_id": rental.movie_id,
            "rental_id": rental.id,
            "remaining_hours": hours_left,
        });

        match self.push.deliver(target, &title, &body, data).await {
            Ok(outcome) if outcome.delivered => Ok(true),
            Ok(outcome) => {
                if outcome.invalid_target {
                    tracing::info!(user_id = %user.id, "Pruning invalid push target");
                    self.user_repo.clear_push_token(user.id).await?;
                }
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(rental_id = %rental.id, error = %e, "Expiry notice delivery failed");
                Ok(false)
            }
        }
    }

    /// Fan one notification out to many users, e.g. a new-content campaign.
    /// Duplicate device tokens collapse to a single delivery, at most
    /// `PUSH_CONCURRENCY` calls run at once, and rate-limited targets are
    /// retried within a fixed budget.
    pub async fn send_bulk(
        &self,
        intent: &NotificationIntent,
        target_user_ids: &[Uuid],
    ) -> Result<BulkReport> {
        let now = Utc::now();
        let users = self.user_repo.find_by_ids(target_user_ids).await?;

        let mut report = BulkReport::default();
        let mut seen_tokens = HashSet::new();
        let mut targets: Vec<(Uuid, String)> = Vec::new();

        for user in &users {
            if !user.can_receive_push(now) {
                report.skipped += 1;
                continue;
            }
            let token = user.push_token.clone().unwrap_or_default();
            // Two accounts on one device resolve to the same token; send once.
            if !seen_tokens.insert(token.clone()) {
                report.skipped += 1;
                continue;
            }
            targets.push((user.id, token));
        }
        report.skipped += target_user_ids.len().saturating_sub(users.len());

        let data = json!({
            "kind": "new_content",
            "movie_id": intent.movie_id,
            "movie_title": intent.movie_title,
        });

        let results = stream::iter(targets.into_iter().map(|(user_id, token)| {
            let data = data.clone();
            async move {
                let outcome = self
                    .deliver_with_backoff(&token, &intent.title, &intent.body, data)
                    .await;
                (user_id, outcome)
            }
        }))
        .buffer_unordered(PUSH_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;

        for (user_id, outcome) in results {
            match outcome {
                Ok(o) if o.delivered => report.delivered += 1,
                Ok(o) => {
                    report.failed += 1;
                    if o.invalid_target {
                        if let Err(e) = self.user_repo.clear_push_token(user_id).await {
                            tracing::warn!(user_id = %user_id, error = %e, "Failed to prune push target");
                        } else {
                            report.pruned_targets += 1;
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(user_id = %user_id, error = %e, "Bulk delivery failed");
                }
            }
        }

        tracing::info!(
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            pruned = report.pruned_targets,
            movie = %intent.movie_title,
            "Bulk notification finished"
        );

        Ok(report)
    }

    async fn deliver_with_backoff(
        &self,
        target: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<crate::notify::DeliveryOutcome> {
        let mut attempt = 0;
        loop {
            let outcome = self.push.deliver(target, title, body, data.clone()).await?;

            match outcome.retry_after_secs {
                Some(wait) if attempt + 1 < RATE_LIMIT_RETRY_BUDGET => {
                    attempt += 1;
                    tracing::debug!(wait, attempt, "Push provider rate-limited, backing off");
                    tokio::time::sleep(StdDuration::from_secs(wait)).await;
                }
                Some(_) => return Ok(outcome),
                None => return Ok(outcome),
            }
        }
    }

}
