use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::{
    access,
    domain::{Payment, PaymentStatus, Rental, RentalKind, RentalStatus},
    error::{AppError, Result},
    payments::{GatewayPaymentStatus, PaymentGateway},
    repository::{MovieRepository, PaymentRepository, RentalRepository, UserRepository},
};

/// Returned from order creation; the client completes payment against the
/// checkout ref and then confirms.
#[derive(Debug, Clone)]
pub struct RentalOrder {
    pub order_code: String,
    pub checkout_ref: String,
    pub amount_cents: i64,
    pub kind: RentalKind,
}

#[derive(Debug, Clone)]
pub enum AccessDecision {
    Granted {
        rental_id: Uuid,
        remaining: chrono::Duration,
        formatted_remaining: String,
    },
    Denied {
        reason: String,
    },
}

pub struct RentalService {
    rental_repo: Arc<dyn RentalRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    user_repo: Arc<dyn UserRepository>,
    movie_repo: Arc<dyn MovieRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RentalService {
    pub fn new(
        rental_repo: Arc<dyn RentalRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        user_repo: Arc<dyn UserRepository>,
        movie_repo: Arc<dyn MovieRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            rental_repo,
            payment_repo,
            user_repo,
            movie_repo,
            gateway,
        }
    }

    /// Start a rental purchase: price the order, record a pending payment and
    /// hand back the gateway checkout reference. No rental exists yet.
    pub async fn create_rental_order(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        kind: RentalKind,
    ) -> Result<RentalOrder> {
        let now = Utc::now();

        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let movie = self
            .movie_repo
            .find_by_id(movie_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movie not found".to_string()))?;

        if let Some(existing) = self
            .rental_repo
            .find_active_for_user_movie(user_id, movie_id, now)
            .await?
        {
            let remaining = access::remaining(&existing, now);
            return Err(AppError::DuplicateActiveRental {
                remaining: access::format_remaining(existing.kind, remaining),
            });
        }

        let amount_cents = kind.price_cents(movie.base_price_cents);
        let order_code = generate_order_code();

        let payment = self
            .payment_repo
            .create(Payment {
                id: Uuid::new_v4(),
                user_id,
                movie_id,
                order_code: order_code.clone(),
                amount_cents,
                currency: "USD".to_string(),
                rental_kind: kind,
                status: PaymentStatus::Pending,
                checkout_ref: None,
                paid_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let description = format!("{} rental: {}", kind.label(), movie.title);
        let checkout_ref = self
            .gateway
            .create_checkout(&order_code, amount_cents, &description)
            .await?;

        self.payment_repo
            .set_checkout_ref(payment.id, &checkout_ref)
            .await?;

        tracing::info!(
            order_code = %order_code,
            user_id = %user_id,
            movie_id = %movie_id,
            amount_cents,
            "Rental order created"
        );

        Ok(RentalOrder {
            order_code,
            checkout_ref,
            amount_cents,
            kind,
        })
    }

    /// Confirm a paid order and activate the rental. Safe against the webhook
    /// and a client poll racing each other: the payment row only transitions
    /// out of Pending once, and the store's unique payment index means the
    /// loser of a creation race gets the winner's rental back instead of
    /// creating a second one.
    pub async fn confirm_rental_payment(&self, order_code: &str, user_id: Uuid) -> Result<Rental> {
        let payment = self
            .payment_repo
            .find_by_order_code(order_code)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.user_id != user_id {
            return Err(AppError::Unauthorized);
        }

        match payment.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Completed => {
                // Duplicate confirmation: report the rental that already exists.
                if let Some(rental) = self.rental_repo.find_by_payment(payment.id).await? {
                    return Ok(rental);
                }
                return Err(AppError::InvalidState(
                    "Payment already completed".to_string(),
                ));
            }
            PaymentStatus::Failed | PaymentStatus::Refunded => {
                return Err(AppError::InvalidState(
                    "Payment is not confirmable".to_string(),
                ));
            }
        }

        match self.gateway.get_payment_status(order_code).await? {
            GatewayPaymentStatus::Paid => {}
            GatewayPaymentStatus::Pending => return Err(AppError::PaymentNotCompleted),
            GatewayPaymentStatus::Failed => {
                self.payment_repo.mark_failed(payment.id).await?;
                return Err(AppError::InvalidState("Payment failed".to_string()));
            }
        }

        let now = Utc::now();
        if !self.payment_repo.mark_completed(payment.id, now).await? {
            // A concurrent confirmation won the Pending -> Completed race;
            // its rental may not be visible yet, so fall through to creation
            // and let the unique index arbitrate.
            if let Some(rental) = self.rental_repo.find_by_payment(payment.id).await? {
                return Ok(rental);
            }
        }

        self.create_rental_for_payment(&payment, now).await
    }

    async fn create_rental_for_payment(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<Rental> {
        let kind = payment.rental_kind;
        let rental = Rental {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            movie_id: payment.movie_id,
            payment_id: payment.id,
            kind,
            starts_at: now,
            ends_at: now + kind.duration(),
            status: RentalStatus::Active,
            expiry_notice_sent: false,
            access_count: 0,
            last_accessed_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.rental_repo.create(rental).await {
            Ok(created) => {
                tracing::info!(
                    rental_id = %created.id,
                    order_code = %payment.order_code,
                    ends_at = %created.ends_at,
                    "Rental activated"
                );
                Ok(created)
            }
            Err(AppError::InvalidState(_)) => {
                // Lost the creation race; the winner's rental is the rental.
                self.rental_repo
                    .find_by_payment(payment.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Database("Rental vanished after uniqueness conflict".to_string())
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Decide whether the user can watch the movie right now. A grant records
    /// the viewing on the rental (access counter + last-accessed timestamp).
    pub async fn check_rental_access(&self, user_id: Uuid, movie_id: Uuid) -> Result<AccessDecision> {
        let now = Utc::now();

        let rental = match self
            .rental_repo
            .find_active_for_user_movie(user_id, movie_id, now)
            .await?
        {
            Some(r) if access::is_active(&r, now) => r,
            _ => {
                return Ok(AccessDecision::Denied {
                    reason: "No active rental for this movie".to_string(),
                })
            }
        };

        self.rental_repo.record_access(rental.id, now).await?;

        let remaining = access::remaining(&rental, now);
        Ok(AccessDecision::Granted {
            rental_id: rental.id,
            remaining,
            formatted_remaining: access::format_remaining(rental.kind, remaining),
        })
    }

    /// User-initiated cancellation; only an active rental can be cancelled.
    pub async fn cancel_rental(&self, user_id: Uuid, rental_id: Uuid) -> Result<Rental> {
        let rental = self
            .rental_repo
            .find_by_id(rental_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Rental not found".to_string()))?;

        if rental.user_id != user_id {
            return Err(AppError::Unauthorized);
        }

        if rental.status != RentalStatus::Active {
            return Err(AppError::InvalidState(
                "Only an active rental can be cancelled".to_string(),
            ));
        }

        if !self.rental_repo.mark_cancelled(rental_id).await? {
            return Err(AppError::InvalidState(
                "Rental is no longer active".to_string(),
            ));
        }

        tracing::info!(rental_id = %rental_id, user_id = %user_id, "Rental cancelled");

        self.rental_repo
            .find_by_id(rental_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to reload cancelled rental".to_string()))
    }
}

fn generate_order_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("RNT-{}", suffix.to_uppercase())
}
