use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tower_sessions::SqliteStore;

pub async fn setup_database(dsn: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(
            SqliteConnectOptions::from_str(dsn)?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(30)),
        )
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Creates the app tables and the session store's table if missing.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    const STATEMENTS: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS snippets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            created DATETIME NOT NULL,
            expires DATETIME NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_snippets_created ON snippets (created)",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            hashed_password TEXT NOT NULL,
            created DATETIME NOT NULL,
            CONSTRAINT users_uc_email UNIQUE (email)
        )
        "#,
    ];

    for stmt in STATEMENTS {
        sqlx::query(stmt).execute(pool).await?;
    }

    SqliteStore::new(pool.clone()).migrate().await
}

/// Single-connection in-memory database; every connection to `:memory:`
/// would otherwise see its own empty schema.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database should open");

    init_schema(&pool).await.expect("schema should apply");
    pool
}
