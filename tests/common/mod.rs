#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use marquee::{
    domain::{Movie, Payment, PaymentStatus, Rental, RentalKind, RentalStatus, User},
    error::Result,
    notify::{DeliveryOutcome, PushDelivery},
    payments::{GatewayPaymentStatus, PaymentGateway},
    repository::{
        MovieRepository, PaymentRepository, RentalRepository, SqliteMovieRepository,
        SqlitePaymentRepository, SqliteRentalRepository, SqliteUserRepository, UserRepository,
    },
    service::ServiceContext,
};

pub async fn setup_pool() -> anyhow::Result<SqlitePool> {
    // Every pooled connection to an in-memory SQLite gets its own database,
    // so the pool must stay at one connection or concurrent tests would see
    // an unmigrated copy.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub struct TestApp {
    pub pool: SqlitePool,
    pub context: ServiceContext,
    pub gateway: Arc<FakeGateway>,
    pub push: Arc<FakePush>,
}

pub async fn setup_app() -> anyhow::Result<TestApp> {
    let pool = setup_pool().await?;

    let rental_repo = Arc::new(SqliteRentalRepository::new(pool.clone()));
    let payment_repo = Arc::new(SqlitePaymentRepository::new(pool.clone()));
    let user_repo = Arc::new(SqliteUserRepository::new(pool.clone()));
    let movie_repo = Arc::new(SqliteMovieRepository::new(pool.clone()));

    let gateway = Arc::new(FakeGateway::new());
    let push = Arc::new(FakePush::new());

    let context = ServiceContext::new(
        rental_repo,
        payment_repo,
        user_repo,
        movie_repo,
        gateway.clone(),
        push.clone(),
    );

    Ok(TestApp {
        pool,
        context,
        gateway,
        push,
    })
}

pub async fn seed_user(repo: &dyn UserRepository, push_token: Option<&str>) -> anyhow::Result<User> {
    let id = Uuid::new_v4();
    let user = repo
        .create(User {
            id,
            email: format!("{}@example.com", id.simple()),
            display_name: "Test Viewer".to_string(),
            push_token: push_token.map(str::to_string),
            push_enabled: true,
            muted_until: None,
            created_at: Utc::now(),
        })
        .await?;
    Ok(user)
}

pub async fn seed_movie(
    repo: &dyn MovieRepository,
    title: &str,
    base_price_cents: i64,
) -> anyhow::Result<Movie> {
    let movie = repo
        .create(Movie {
            id: Uuid::new_v4(),
            title: title.to_string(),
            base_price_cents,
            created_at: Utc::now(),
        })
        .await?;
    Ok(movie)
}

pub async fn seed_completed_payment(
    repo: &dyn PaymentRepository,
    user_id: Uuid,
    movie_id: Uuid,
    kind: RentalKind,
) -> anyhow::Result<Payment> {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let payment = repo
        .create(Payment {
            id,
            user_id,
            movie_id,
            order_code: format!("RNT-{}", id.simple()),
            amount_cents: 30_000,
            currency: "USD".to_string(),
            rental_kind: kind,
            status: PaymentStatus::Completed,
            checkout_ref: Some("chk_test".to_string()),
            paid_at: Some(now),
            created_at: now,
            updated_at: now,
        })
        .await?;
    Ok(payment)
}

/// Insert an active rental with an explicit time window, funding it with a
/// fresh completed payment so the foreign keys and the payment-uniqueness
/// index are satisfied.
pub async fn seed_rental(
    context: &ServiceContext,
    user_id: Uuid,
    movie_id: Uuid,
    kind: RentalKind,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> anyhow::Result<Rental> {
    let payment =
        seed_completed_payment(context.payment_repo.as_ref(), user_id, movie_id, kind).await?;

    let rental = context
        .rental_repo
        .create(Rental {
            id: Uuid::new_v4(),
            user_id,
            movie_id,
            payment_id: payment.id,
            kind,
            starts_at,
            ends_at,
            status: RentalStatus::Active,
            expiry_notice_sent: false,
            access_count: 0,
            last_accessed_at: None,
            created_at: starts_at,
            updated_at: starts_at,
        })
        .await?;
    Ok(rental)
}

pub struct FakeGateway {
    status: Mutex<GatewayPaymentStatus>,
    pub checkout_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(GatewayPaymentStatus::Pending),
            checkout_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: GatewayPaymentStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout(
        &self,
        order_code: &str,
        _amount_cents: i64,
        _description: &str,
    ) -> Result<String> {
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("chk_{}", order_code))
    }

    async fn get_payment_status(&self, _order_code: &str) -> Result<GatewayPaymentStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.status.lock().unwrap())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedPush {
    pub target: String,
    pub title: String,
    pub body: String,
}

pub struct FakePush {
    /// Pre-programmed outcomes, consumed front-to-back; when empty, every
    /// delivery succeeds.
    outcomes: Mutex<VecDeque<Result<DeliveryOutcome>>>,
    sent: Mutex<Vec<RecordedPush>>,
}

impl FakePush {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn enqueue(&self, outcome: Result<DeliveryOutcome>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn sent(&self) -> Vec<RecordedPush> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl PushDelivery for FakePush {
    async fn deliver(
        &self,
        target: &str,
        title: &str,
        body: &str,
        _data: serde_json::Value,
    ) -> Result<DeliveryOutcome> {
        self.sent.lock().unwrap().push(RecordedPush {
            target: target.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });

        match self.outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(DeliveryOutcome {
                delivered: true,
                invalid_target: false,
                retry_after_secs: None,
            }),
        }
    }
}
