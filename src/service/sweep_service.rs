use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    access,
    error::Result,
    notify::NotificationDispatcher,
    repository::{MovieRepository, RentalRepository},
};

/// Outcome of one background sweep. One item's failure never aborts the rest
/// of the batch; it is logged and counted here instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    pub scanned: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct SweepService {
    rental_repo: Arc<dyn RentalRepository>,
    movie_repo: Arc<dyn MovieRepository>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl SweepService {
    pub fn new(
        rental_repo: Arc<dyn RentalRepository>,
        movie_repo: Arc<dyn MovieRepository>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            rental_repo,
            movie_repo,
            dispatcher,
        }
    }

    /// Transition every active rental whose window has passed to `Expired`.
    /// Re-running is a no-op: the query only matches rows still `Active`.
    pub async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expired = self.rental_repo.find_expired(now).await?;
        let mut report = SweepReport {
            scanned: expired.len(),
            ..Default::default()
        };

        for rental in expired {
            match self.rental_repo.mark_expired(rental.id).await {
                Ok(true) => {
                    tracing::info!(rental_id = %rental.id, ends_at = %rental.ends_at, "Rental expired");
                    report.succeeded += 1;
                }
                Ok(false) => {
                    // Another sweep got there first; nothing left to do.
                    tracing::debug!(rental_id = %rental.id, "Rental already transitioned");
                }
                Err(e) => {
                    tracing::warn!(rental_id = %rental.id, error = %e, "Expiry transition failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            succeeded = report.succeeded,
            failed = report.failed,
            "Expiry sweep finished"
        );

        Ok(report)
    }

    /// Warn owners of rentals entering the expiring-soon window. Rentals whose
    /// notice already went out are excluded by the query, and the dispatcher's
    /// flag claim keeps overlapping sweeps to at most one notice per rental.
    pub async fn run_notification_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expiring = self
            .rental_repo
            .find_expiring_soon(now, access::expiry_warning_threshold())
            .await?;
        let mut report = SweepReport {
            scanned: expiring.len(),
            ..Default::default()
        };

        for rental in expiring {
            let title = match self.movie_repo.find_by_id(rental.movie_id).await {
                Ok(Some(movie)) => movie.title,
                Ok(None) => {
                    tracing::warn!(rental_id = %rental.id, movie_id = %rental.movie_id, "Movie missing for expiring rental");
                    report.failed += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(rental_id = %rental.id, error = %e, "Movie lookup failed");
                    report.failed += 1;
                    continue;
                }
            };

            match self.dispatcher.process_expiring_rental(&rental, &title).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    tracing::warn!(rental_id = %rental.id, error = %e, "Expiry notice failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            succeeded = report.succeeded,
            failed = report.failed,
            "Notification sweep finished"
        );

        Ok(report)
    }
}
