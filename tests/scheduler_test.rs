mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Notify;

use common::{seed_movie, seed_rental, seed_user, setup_app, FakeGateway};
use marquee::{
    config::SchedulerConfig,
    domain::{RentalKind, RentalStatus},
    error::Result,
    notify::{DeliveryOutcome, PushDelivery},
    repository::{
        SqliteMovieRepository, SqlitePaymentRepository, SqliteRentalRepository,
        SqliteUserRepository,
    },
    scheduler::{JobName, Scheduler},
    service::ServiceContext,
};

/// Push fake that parks every delivery until the test releases it, so a sweep
/// can be held in flight deliberately.
struct GatedPush {
    entered: Notify,
    release: Notify,
}

impl GatedPush {
    fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl PushDelivery for GatedPush {
    async fn deliver(
        &self,
        _target: &str,
        _title: &str,
        _body: &str,
        _data: serde_json::Value,
    ) -> Result<DeliveryOutcome> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(DeliveryOutcome {
            delivered: true,
            ..Default::default()
        })
    }
}

async fn setup_gated_context() -> anyhow::Result<(ServiceContext, Arc<GatedPush>)> {
    let pool = common::setup_pool().await?;

    let rental_repo = Arc::new(SqliteRentalRepository::new(pool.clone()));
    let payment_repo = Arc::new(SqlitePaymentRepository::new(pool.clone()));
    let user_repo = Arc::new(SqliteUserRepository::new(pool.clone()));
    let movie_repo = Arc::new(SqliteMovieRepository::new(pool.clone()));

    let push = Arc::new(GatedPush::new());

    let context = ServiceContext::new(
        rental_repo,
        payment_repo,
        user_repo,
        movie_repo,
        Arc::new(FakeGateway::new()),
        push.clone(),
    );

    Ok((context, push))
}

/// Seed one rental inside the expiry-warning window so the notice sweep has
/// exactly one delivery to make.
async fn seed_expiring_rental(context: &ServiceContext) -> anyhow::Result<()> {
    let user = seed_user(context.user_repo.as_ref(), Some("tok-gate")).await?;
    let movie = seed_movie(context.movie_repo.as_ref(), "Heat", 100_000).await?;

    let now = Utc::now();
    seed_rental(
        context,
        user.id,
        movie.id,
        RentalKind::FortyEightHours,
        now - Duration::hours(47),
        now + Duration::minutes(90),
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn jobs_start_stop_independently() -> anyhow::Result<()> {
    let app = setup_app().await?;
    let scheduler =
        Scheduler::new(&SchedulerConfig::default(), app.context.sweep_service.clone()).await?;

    let stopped = scheduler.status().await;
    assert_eq!(stopped.len(), 2);
    assert!(stopped.iter().all(|s| !s.running));

    scheduler.start(JobName::ExpirySweep).await?;
    let partial = scheduler.status().await;
    assert!(partial
        .iter()
        .any(|s| s.name == "expiry-sweep" && s.running));
    assert!(partial
        .iter()
        .any(|s| s.name == "expiry-notice" && !s.running));

    // Starting twice is a no-op.
    scheduler.start(JobName::ExpirySweep).await?;

    scheduler.start_all().await?;
    assert!(scheduler.status().await.iter().all(|s| s.running));

    scheduler.stop(JobName::ExpiryNotice).await?;
    let after_stop = scheduler.status().await;
    assert!(after_stop
        .iter()
        .any(|s| s.name == "expiry-notice" && !s.running));

    scheduler.stop_all().await?;
    assert!(scheduler.status().await.iter().all(|s| !s.running));

    Ok(())
}

#[tokio::test]
async fn run_now_performs_the_same_sweep_as_the_timer() -> anyhow::Result<()> {
    let app = setup_app().await?;
    let user = seed_user(app.context.user_repo.as_ref(), Some("tok-cron")).await?;
    let movie = seed_movie(app.context.movie_repo.as_ref(), "Heat", 100_000).await?;

    let now = Utc::now();
    let overdue = seed_rental(
        &app.context,
        user.id,
        movie.id,
        RentalKind::FortyEightHours,
        now - Duration::hours(50),
        now - Duration::hours(2),
    )
    .await?;

    let scheduler =
        Scheduler::new(&SchedulerConfig::default(), app.context.sweep_service.clone()).await?;

    // Jobs need not be started for a manual run.
    let report = scheduler
        .run_now(JobName::ExpirySweep)
        .await?
        .expect("sweep should not be skipped");
    assert_eq!(report.succeeded, 1);

    let reloaded = app.context.rental_repo.find_by_id(overdue.id).await?.unwrap();
    assert_eq!(reloaded.status, RentalStatus::Expired);

    // Notification job shares the run-now path too.
    let notice_report = scheduler
        .run_now(JobName::ExpiryNotice)
        .await?
        .expect("sweep should not be skipped");
    assert_eq!(notice_report.scanned, 0);

    Ok(())
}

#[tokio::test]
async fn bad_cron_expression_is_rejected_at_start() -> anyhow::Result<()> {
    let app = setup_app().await?;
    let config = SchedulerConfig {
        timezone: "UTC".to_string(),
        expiry_sweep_cron: "not a cron".to_string(),
        expiry_notice_cron: "0 0,30 * * * *".to_string(),
    };
    let scheduler = Scheduler::new(&config, app.context.sweep_service.clone()).await?;

    assert!(scheduler.start(JobName::ExpirySweep).await.is_err());
    assert!(scheduler.start(JobName::ExpiryNotice).await.is_ok());
    scheduler.stop_all().await?;

    Ok(())
}

#[tokio::test]
async fn overlapping_run_of_a_busy_job_is_skipped() -> anyhow::Result<()> {
    let (context, push) = setup_gated_context().await?;
    seed_expiring_rental(&context).await?;

    let scheduler =
        Arc::new(Scheduler::new(&SchedulerConfig::default(), context.sweep_service.clone()).await?);

    let in_flight = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_now(JobName::ExpiryNotice).await })
    };

    // Wait until the first run is parked inside the push delivery.
    push.entered.notified().await;

    // A second tick of the same job bows out instead of running concurrently.
    assert!(scheduler.run_now(JobName::ExpiryNotice).await?.is_none());
    // The other job has its own guard and still runs.
    assert!(scheduler.run_now(JobName::ExpirySweep).await?.is_some());

    push.release.notify_one();
    let report = in_flight.await??.expect("held run should complete, not skip");
    assert_eq!(report.succeeded, 1);

    // With the first run finished, the job accepts work again.
    assert!(scheduler.run_now(JobName::ExpiryNotice).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn job_accepts_work_after_an_in_flight_run_is_aborted() -> anyhow::Result<()> {
    let (context, push) = setup_gated_context().await?;
    seed_expiring_rental(&context).await?;

    let scheduler =
        Arc::new(Scheduler::new(&SchedulerConfig::default(), context.sweep_service.clone()).await?);

    let in_flight = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_now(JobName::ExpiryNotice).await })
    };
    push.entered.notified().await;

    // Drop the run mid-delivery; the busy guard must not stay latched.
    in_flight.abort();
    assert!(in_flight.await.unwrap_err().is_cancelled());

    let report = scheduler
        .run_now(JobName::ExpiryNotice)
        .await?
        .expect("job should not stay marked busy");
    // The aborted run had already claimed the one-shot notice flag.
    assert_eq!(report.scanned, 0);

    Ok(())
}
