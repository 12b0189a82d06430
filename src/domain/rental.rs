use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's time-bounded access grant to one movie. Created only once the
/// funding payment is confirmed; `ends_at` is derived from the kind at
/// creation and never changes afterward.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rental {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub payment_id: Uuid,
    pub kind: RentalKind,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: RentalStatus,
    pub expiry_notice_sent: bool,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum RentalKind {
    FortyEightHours,
    ThirtyDays,
}

impl RentalKind {
    pub fn duration(&self) -> Duration {
        match self {
            RentalKind::FortyEightHours => Duration::hours(48),
            RentalKind::ThirtyDays => Duration::days(30),
        }
    }

    /// Rental price as a fraction of the movie's base price, in percent.
    pub fn price_percent(&self) -> i64 {
        match self {
            RentalKind::FortyEightHours => 30,
            RentalKind::ThirtyDays => 50,
        }
    }

    pub fn price_cents(&self, base_price_cents: i64) -> i64 {
        base_price_cents * self.price_percent() / 100
    }

    pub fn label(&self) -> &'static str {
        match self {
            RentalKind::FortyEightHours => "48-hour",
            RentalKind::ThirtyDays => "30-day",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum RentalStatus {
    Active,
    Expired,
    Cancelled,
}
