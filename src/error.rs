use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("An active rental already exists for this movie ({remaining} remaining)")]
    DuplicateActiveRental { remaining: String },

    #[error("Payment has not been completed yet")]
    PaymentNotCompleted,

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Push delivery target is no longer valid")]
    InvalidDeliveryTarget,

    #[error("External service error: {0}")]
    External(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => AppError::Transient(err.to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}
