use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::User,
    error::{AppError, Result},
    repository::rental_repository::{parse_uuid, to_utc},
    repository::UserRepository,
};

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    display_name: String,
    push_token: Option<String>,
    push_enabled: bool,
    muted_until: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

const USER_COLUMNS: &str =
    "id, email, display_name, push_token, push_enabled, muted_until, created_at";

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            email: row.email,
            display_name: row.display_name,
            push_token: row.push_token,
            push_enabled: row.push_enabled,
            muted_until: row.muted_until.map(to_utc),
            created_at: to_utc(row.created_at),
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, push_token, push_enabled, muted_until, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.push_token)
        .bind(user.push_enabled)
        .bind(user.muted_until.map(|dt| dt.naive_utc()))
        .bind(user.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        self.find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created user".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!(
            "SELECT {} FROM users WHERE id IN ({})",
            USER_COLUMNS, placeholders
        );

        let mut q = sqlx::query_as::<_, UserRow>(&query);
        for id in ids {
            q = q.bind(id.to_string());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_user).collect()
    }

    async fn clear_push_token(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET push_token = NULL WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
