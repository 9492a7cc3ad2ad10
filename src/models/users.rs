use chrono::{SubsecRound, Utc};
use sqlx::SqlitePool;

use super::{ModelError, User};

const BCRYPT_COST: u32 = 12;

#[derive(Clone)]
pub struct UserModel {
    pool: SqlitePool,
    hash_cost: u32,
}

impl UserModel {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hash_cost: BCRYPT_COST,
        }
    }

    /// Overrides the bcrypt work factor.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), ModelError> {
        let password = password.to_owned();
        let cost = self.hash_cost;
        let hashed_password =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        sqlx::query(
            r#"
            INSERT INTO users (name, email, hashed_password, created)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .bind(Utc::now().trunc_subsecs(0))
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation() && db_err.message().contains("email") =>
            {
                ModelError::DuplicateEmail
            }
            _ => ModelError::Database(err),
        })?;

        Ok(())
    }

    /// Returns the user's id when the email and password match a stored user.
    ///
    /// An unknown email and a wrong password both yield
    /// [`ModelError::InvalidCredentials`].
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, hashed_password, created FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ModelError::InvalidCredentials)?;

        let password = password.to_owned();
        let hashed_password = user.hashed_password;
        let matched =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed_password))
                .await??;

        if matched {
            Ok(user.id)
        } else {
            Err(ModelError::InvalidCredentials)
        }
    }

    pub async fn exists(&self, id: i64) -> Result<bool, ModelError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}
