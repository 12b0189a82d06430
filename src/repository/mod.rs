use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod movie_repository;
pub mod payment_repository;
pub mod rental_repository;
pub mod user_repository;

pub use movie_repository::SqliteMovieRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use rental_repository::SqliteRentalRepository;
pub use user_repository::SqliteUserRepository;

#[async_trait]
pub trait RentalRepository: Send + Sync {
    async fn create(&self, rental: Rental) -> Result<Rental>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Rental>>;
    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Rental>>;
    async fn find_active_for_user_movie(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Rental>>;
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Rental>>;
    async fn find_expiring_soon(
        &self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<Vec<Rental>>;
    /// Transition to `Expired` iff still `Active`. Returns whether a row changed.
    async fn mark_expired(&self, id: Uuid) -> Result<bool>;
    /// Transition to `Cancelled` iff still `Active`. Returns whether a row changed.
    async fn mark_cancelled(&self, id: Uuid) -> Result<bool>;
    /// Set the one-shot expiry-notice flag iff still unset on an active rental.
    /// Returns whether this call won the flag.
    async fn mark_notice_sent(&self, id: Uuid) -> Result<bool>;
    async fn record_access(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_order_code(&self, order_code: &str) -> Result<Option<Payment>>;
    async fn set_checkout_ref(&self, id: Uuid, checkout_ref: &str) -> Result<()>;
    /// Transition to `Completed` iff still `Pending`. Returns whether this
    /// call won the transition (false means a concurrent confirmation won).
    async fn mark_completed(&self, id: Uuid, paid_at: DateTime<Utc>) -> Result<bool>;
    async fn mark_failed(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>>;
    /// Drop an invalid push target so future dispatches stop retrying it.
    async fn clear_push_token(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait MovieRepository: Send + Sync {
    async fn create(&self, movie: Movie) -> Result<Movie>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Movie>>;
}
