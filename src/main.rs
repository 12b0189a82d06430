use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee::{
    config::Settings,
    notify::HttpPushClient,
    payments::HttpCheckoutClient,
    repository::{
        SqliteMovieRepository, SqlitePaymentRepository, SqliteRentalRepository,
        SqliteUserRepository,
    },
    scheduler::Scheduler,
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Marquee rental backend");

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Initialize repositories
    let rental_repo = Arc::new(SqliteRentalRepository::new(db_pool.clone()));
    let payment_repo = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
    let user_repo = Arc::new(SqliteUserRepository::new(db_pool.clone()));
    let movie_repo = Arc::new(SqliteMovieRepository::new(db_pool.clone()));

    // Outbound collaborators
    let gateway = Arc::new(HttpCheckoutClient::new(&settings.gateway)?);
    let push = Arc::new(HttpPushClient::new(&settings.push)?);

    let context = Arc::new(ServiceContext::new(
        rental_repo,
        payment_repo,
        user_repo,
        movie_repo,
        gateway,
        push,
    ));

    // Background jobs: hourly expiry sweep, half-hourly notification check
    let scheduler = Scheduler::new(&settings.scheduler, context.sweep_service.clone()).await?;
    scheduler.start_all().await?;

    for status in scheduler.status().await {
        tracing::info!(
            job = status.name,
            schedule = %status.schedule,
            running = status.running,
            "Job registered"
        );
    }

    // The HTTP layer in front of this core owns request serving; this binary
    // keeps the sweeps alive until it is told to shut down.
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    scheduler.stop_all().await?;

    Ok(())
}
