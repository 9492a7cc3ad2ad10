use chrono::{DateTime, Duration, SubsecRound, Utc};
use sqlx::SqlitePool;

use super::{ModelError, Snippet};

const LATEST_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct SnippetModel {
    pool: SqlitePool,
}

impl SnippetModel {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores a snippet that stays visible for `expires_days` days and returns its id.
    pub async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: i64,
    ) -> Result<i64, ModelError> {
        let created = Utc::now().trunc_subsecs(0);
        let expires = created + Duration::days(expires_days);

        let id = sqlx::query(
            r#"
            INSERT INTO snippets (title, content, created, expires)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(created)
        .bind(expires)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Snippet, ModelError> {
        self.get_as_of(id, Utc::now()).await
    }

    pub async fn get_as_of(&self, id: i64, now: DateTime<Utc>) -> Result<Snippet, ModelError> {
        sqlx::query_as::<_, Snippet>(
            "SELECT id, title, content, created, expires FROM snippets WHERE expires > ? AND id = ?",
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ModelError::NoRecord)
    }

    /// The ten most recently created snippets that have not expired.
    pub async fn latest(&self) -> Result<Vec<Snippet>, ModelError> {
        self.latest_as_of(Utc::now()).await
    }

    pub async fn latest_as_of(&self, now: DateTime<Utc>) -> Result<Vec<Snippet>, ModelError> {
        let snippets = sqlx::query_as::<_, Snippet>(
            r#"
            SELECT id, title, content, created, expires FROM snippets
            WHERE expires > ? ORDER BY id DESC LIMIT ?
            "#,
        )
        .bind(now)
        .bind(LATEST_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(snippets)
    }
}
