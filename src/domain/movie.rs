use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog entry, as exposed by the catalog subsystem. The rental core only
/// needs the title (for notifications) and the base price (for order pricing).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub base_price_cents: i64,
    pub created_at: DateTime<Utc>,
}
