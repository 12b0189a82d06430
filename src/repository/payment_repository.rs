use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus, RentalKind},
    error::{AppError, Result},
    repository::rental_repository::{parse_uuid, to_utc},
    repository::PaymentRepository,
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    user_id: String,
    movie_id: String,
    order_code: String,
    amount_cents: i64,
    currency: String,
    rental_kind: String,
    status: String,
    checkout_ref: Option<String>,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const PAYMENT_COLUMNS: &str = r#"
    id, user_id, movie_id, order_code, amount_cents, currency, rental_kind,
    status, checkout_ref, paid_at, created_at, updated_at
"#;

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            movie_id: parse_uuid(&row.movie_id)?,
            order_code: row.order_code,
            amount_cents: row.amount_cents,
            currency: row.currency,
            rental_kind: Self::parse_kind(&row.rental_kind)?,
            status: Self::parse_status(&row.status)?,
            checkout_ref: row.checkout_ref,
            paid_at: row.paid_at.map(to_utc),
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

    fn parse_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Completed" => Ok(PaymentStatus::Completed),
            "Failed" => Ok(PaymentStatus::Failed),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn status_to_str(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, movie_id, order_code, amount_cents, currency,
                rental_kind, status, checkout_ref, paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.user_id.to_string())
        .bind(payment.movie_id.to_string())
        .bind(&payment.order_code)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(Self::kind_to_str(payment.rental_kind))
        .bind(Self::status_to_str(payment.status))
        .bind(&payment.checkout_ref)
        .bind(payment.paid_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created payment".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_order_code(&self, order_code: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_code = ?",
            PAYMENT_COLUMNS
        ))
        .bind(order_code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn set_checkout_ref(&self, id: Uuid, checkout_ref: &str) -> Result<()> {
        sqlx::query("UPDATE payments SET checkout_ref = ?, updated_at = ? WHERE id = ?")
            .bind(checkout_ref)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, paid_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'Completed', paid_at = ?, updated_at = ?
            WHERE id = ? AND status = 'Pending'
            "#,
        )
        .bind(paid_at.naive_utc())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'Failed', updated_at = ?
            WHERE id = ? AND status = 'Pending'
            "#,
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
