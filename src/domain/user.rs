use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Viewer account, as exposed by the account subsystem. The rental core only
/// reads identity and push-delivery fields; everything else lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub push_token: Option<String>,
    pub push_enabled: bool,
    pub muted_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// True when the user currently has a usable push-delivery target.
    pub fn can_receive_push(&self, now: DateTime<Utc>) -> bool {
        if !self.push_enabled || self.push_token.is_none() {
            return false;
        }
        match self.muted_until {
            Some(until) => until <= now,
            None => true,
        }
    }
}
