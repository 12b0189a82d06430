use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Rental, RentalKind, RentalStatus},
    error::{AppError, Result},
    repository::RentalRepository,
};

#[derive(FromRow)]
struct RentalRow {
    id: String,
    user_id: String,
    movie_id: String,
    payment_id: String,
    kind: String,
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
    status: String,
    expiry_notice_sent: bool,
    access_count: i64,
    last_accessed_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const RENTAL_COLUMNS: &str = r#"
    id, user_id, movie_id, payment_id, kind, starts_at, ends_at, status,
    expiry_notice_sent, access_count, last_accessed_at, created_at, updated_at
"#;

pub struct SqliteRentalRepository {
    pool: SqlitePool,
}

impl SqliteRentalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_rental(row: RentalRow) -> Result<Rental> {
        Ok(Rental {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            movie_id: parse_uuid(&row.movie_id)?,
            payment_id: parse_uuid(&row.payment_id)?,
            kind: Self::parse_kind(&row.kind)?,
            starts_at: to_utc(row.starts_at),
            ends_at: to_utc(row.ends_at),
            status: Self::parse_status(&row.status)?,
            expiry_notice_sent: row.expiry_notice_sent,
            access_count: row.access_count,
            last_accessed_at: row.last_accessed_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn parse_kind(s: &str) -> Result<RentalKind> {
        match s {
            "FortyEightHours" => Ok(RentalKind::FortyEightHours),
            "ThirtyDays" => Ok(RentalKind::ThirtyDays),
            _ => Err(AppError::Database(format!("Invalid rental kind: {}", s))),
        }
    }

    fn kind_to_str(kind: RentalKind) -> &'static str {
        match kind {
            RentalKind::FortyEightHours => "FortyEightHours",
            RentalKind::ThirtyDays => "ThirtyDays",
        }
    }

    fn parse_status(s: &str) -> Result<RentalStatus> {
        match s {
            "Active" => Ok(RentalStatus::Active),
            "Expired" => Ok(RentalStatus::Expired),
            "Cancelled" => Ok(RentalStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid rental status: {}", s))),
        }
    }
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

#[async_trait]
impl RentalRepository for SqliteRentalRepository {
    async fn create(&self, rental: Rental) -> Result<Rental> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO rentals (
                id, user_id, movie_id, payment_id, kind, starts_at, ends_at,
                status, expiry_notice_sent, access_count, last_accessed_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rental.id.to_string())
        .bind(rental.user_id.to_string())
        .bind(rental.movie_id.to_string())
        .bind(rental.payment_id.to_string())
        .bind(Self::kind_to_str(rental.kind))
        .bind(rental.starts_at.naive_utc())
        .bind(rental.ends_at.naive_utc())
        .bind("Active")
        .bind(false)
        .bind(0i64)
        .bind(Option::<NaiveDateTime>::None)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            // The unique index on payment_id is the store-level guarantee that
            // a payment funds at most one rental; the service resolves this by
            // returning the rental the concurrent confirmation created.
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return Err(AppError::InvalidState(
                        "a rental already exists for this payment".to_string(),
                    ));
                }
            }
            return Err(e.into());
        }

        self.find_by_id(rental.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created rental".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Rental>> {
        let row = sqlx::query_as::<_, RentalRow>(&format!(
            "SELECT {} FROM rentals WHERE id = ?",
            RENTAL_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_rental).transpose()
    }

    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Rental>> {
        let row = sqlx::query_as::<_, RentalRow>(&format!(
            "SELECT {} FROM rentals WHERE payment_id = ?",
            RENTAL_COLUMNS
        ))
        .bind(payment_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_rental).transpose()
    }

    async fn find_active_for_user_movie(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Rental>> {
        let row = sqlx::query_as::<_, RentalRow>(&format!(
            r#"
            SELECT {} FROM rentals
            WHERE user_id = ? AND movie_id = ? AND status = 'Active' AND ends_at > ?
            ORDER BY ends_at DESC
            LIMIT 1
            "#,
            RENTAL_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(movie_id.to_string())
        .bind(now.naive_utc())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_rental).transpose()
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Rental>> {
        let rows = sqlx::query_as::<_, RentalRow>(&format!(
            "SELECT {} FROM rentals WHERE status = 'Active' AND ends_at < ?",
            RENTAL_COLUMNS
        ))
        .bind(now.naive_utc())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_rental).collect()
    }

    async fn find_expiring_soon(
        &self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<Vec<Rental>> {
        // Rentals whose notice already went out are excluded here so every
        // sweep after the flag is set no longer matches them.
        let rows = sqlx::query_as::<_, RentalRow>(&format!(
            r#"
            SELECT {} FROM rentals
            WHERE status = 'Active'
              AND expiry_notice_sent = 0
              AND ends_at >= ?
              AND ends_at <= ?
            "#,
            RENTAL_COLUMNS
        ))
        .bind(now.naive_utc())
        .bind((now + threshold).naive_utc())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_rental).collect()
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE rentals SET status = 'Expired', updated_at = ? WHERE id = ? AND status = 'Active'",
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE rentals SET status = 'Cancelled', updated_at = ? WHERE id = ? AND status = 'Active'",
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_notice_sent(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE rentals SET expiry_notice_sent = 1, updated_at = ?
            WHERE id = ? AND status = 'Active' AND expiry_notice_sent = 0
            "#,
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_access(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE rentals
            SET access_count = access_count + 1, last_accessed_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
