use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::Movie,
    error::{AppError, Result},
    repository::rental_repository::{parse_uuid, to_utc},
    repository::MovieRepository,
};

#[derive(FromRow)]
struct MovieRow {
    id: String,
    title: String,
    base_price_cents: i64,
    created_at: NaiveDateTime,
}

pub struct SqliteMovieRepository {
    pool: SqlitePool,
}

impl SqliteMovieRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_movie(row: MovieRow) -> Result<Movie> {
        Ok(Movie {
            id: parse_uuid(&row.id)?,
            title: row.title,
            base_price_cents: row.base_price_cents,
            created_at: to_utc(row.created_at),
        })
    }
}

#[async_trait]
impl MovieRepository for SqliteMovieRepository {
    async fn create(&self, movie: Movie) -> Result<Movie> {
        sqlx::query(
            "INSERT INTO movies (id, title, base_price_cents, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(movie.id.to_string())
        .bind(&movie.title)
        .bind(movie.base_price_cents)
        .bind(movie.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        self.find_by_id(movie.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created movie".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Movie>> {
        let row = sqlx::query_as::<_, MovieRow>(
            "SELECT id, title, base_price_cents, created_at FROM movies WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_movie).transpose()
    }
}
