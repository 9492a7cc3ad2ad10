//! Sessions backed by `tower-sessions` and its SQLite store.
//!
//! The manager layer loads the session named by the `session` cookie and
//! saves it after the handler returns if anything changed. Everything the app
//! keeps between requests lives in one typed [`SessionData`] value, reached
//! through the [`Session`] wrapper.

use std::time::Duration as StdDuration;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Extensions, StatusCode};
use axum::BoxError;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_sessions::cookie::SameSite;
use tower_sessions::{ExpiredDeletion, Expiry, SessionManagerLayer, SqliteStore};

use crate::config::Config;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session";

const DATA_KEY: &str = "snippetbox.data";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session data error: {0}")]
    Data(#[from] tower_sessions::session::Error),
}

/// Values kept for a client between requests.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub authenticated_user_id: Option<i64>,
    #[serde(default)]
    pub flash: Option<String>,
    #[serde(default)]
    pub redirect_after_login: Option<String>,
}

/// Cookie settings for the session manager. A session lives for the
/// configured lifetime after it was last written.
pub fn layer(store: SqliteStore, config: &Config) -> SessionManagerLayer<SqliteStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(config.cookies_secure())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(
            config.session_lifetime_hours,
        )))
}

/// Turns a session manager failure into a response.
///
/// A cookie that is not a session id is the client's fault; store failures
/// are ours.
pub async fn handle_error(err: BoxError) -> AppError {
    if err.is::<tower_sessions::session::Error>() {
        tracing::warn!(error = %err, "malformed session cookie");
        AppError::ClientError(StatusCode::BAD_REQUEST)
    } else {
        AppError::Internal(anyhow::anyhow!("session store failure: {err}"))
    }
}

/// Periodically removes expired rows until the runtime shuts down.
pub fn spawn_cleanup(store: SqliteStore, period: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = store.continuously_delete_expired(period).await {
            tracing::warn!(error = %err, "session cleanup stopped");
        }
    })
}

/// Handle to the current request's session.
///
/// Clones share state with the session the manager will save.
#[derive(Debug, Clone)]
pub struct Session(tower_sessions::Session);

impl Session {
    pub fn from_extensions(extensions: &Extensions) -> Option<Self> {
        extensions.get::<tower_sessions::Session>().cloned().map(Self)
    }

    fn data(&self) -> Result<SessionData, SessionError> {
        Ok(self.0.get(DATA_KEY)?.unwrap_or_default())
    }

    fn update(&self, f: impl FnOnce(&mut SessionData)) -> Result<(), SessionError> {
        let mut data = self.data()?;
        f(&mut data);
        self.0.insert(DATA_KEY, &data)?;
        Ok(())
    }

    /// Takes a value out of the session, writing back only if there was one.
    fn take<T>(
        &self,
        field: impl FnOnce(&mut SessionData) -> Option<T>,
    ) -> Result<Option<T>, SessionError> {
        let mut data = self.data()?;
        let value = field(&mut data);
        if value.is_some() {
            self.0.insert(DATA_KEY, &data)?;
        }
        Ok(value)
    }

    pub fn user_id(&self) -> Result<Option<i64>, SessionError> {
        Ok(self.data()?.authenticated_user_id)
    }

    pub fn put_user_id(&self, id: i64) -> Result<(), SessionError> {
        self.update(|data| data.authenticated_user_id = Some(id))
    }

    pub fn remove_user_id(&self) -> Result<(), SessionError> {
        self.take(|data| data.authenticated_user_id.take()).map(drop)
    }

    pub fn put_flash(&self, message: impl Into<String>) -> Result<(), SessionError> {
        let message = message.into();
        self.update(|data| data.flash = Some(message))
    }

    /// Returns the flash message and clears it.
    pub fn pop_flash(&self) -> Result<Option<String>, SessionError> {
        self.take(|data| data.flash.take())
    }

    pub fn put_redirect_after_login(&self, path: impl Into<String>) -> Result<(), SessionError> {
        let path = path.into();
        self.update(|data| data.redirect_after_login = Some(path))
    }

    pub fn pop_redirect_after_login(&self) -> Result<Option<String>, SessionError> {
        self.take(|data| data.redirect_after_login.take())
    }

    /// Moves the session to a fresh id; the old row is deleted when the
    /// response is sent.
    pub fn renew_token(&self) {
        self.0.cycle_id();
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_extensions(&parts.extensions)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session layer is not installed")))
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use tower_sessions::session::Deletion;
    use tower_sessions::SessionStore;

    use super::*;
    use crate::database::test_pool;

    fn fresh() -> (tower_sessions::Session, Session) {
        let inner = tower_sessions::Session::new(None);
        (inner.clone(), Session(inner))
    }

    #[test]
    fn flash_is_read_once() {
        let (_, session) = fresh();
        assert_eq!(session.pop_flash().unwrap(), None);

        session.put_flash("hello").unwrap();
        assert_eq!(session.pop_flash().unwrap().as_deref(), Some("hello"));
        assert_eq!(session.pop_flash().unwrap(), None);
    }

    #[test]
    fn reading_does_not_modify() {
        let (inner, session) = fresh();
        assert_eq!(session.user_id().unwrap(), None);
        assert_eq!(session.pop_flash().unwrap(), None);
        session.remove_user_id().unwrap();
        assert!(!inner.is_modified());

        session.put_user_id(4).unwrap();
        assert!(inner.is_modified());
        assert_eq!(session.user_id().unwrap(), Some(4));
    }

    #[test]
    fn fields_are_independent() {
        let (_, session) = fresh();
        session.put_user_id(9).unwrap();
        session.put_redirect_after_login("/snippet/create").unwrap();
        session.put_flash("hi").unwrap();

        assert_eq!(session.pop_flash().unwrap().as_deref(), Some("hi"));
        assert_eq!(
            session.pop_redirect_after_login().unwrap().as_deref(),
            Some("/snippet/create")
        );
        assert_eq!(session.user_id().unwrap(), Some(9));
    }

    #[test]
    fn renewing_cycles_the_id() {
        let (inner, session) = fresh();
        session.put_user_id(3).unwrap();
        let old = *inner.id();

        session.renew_token();
        assert!(matches!(inner.deleted(), Some(Deletion::Cycled(id)) if id == old));
    }

    #[tokio::test]
    async fn expired_sessions_are_not_loaded_and_get_cleaned_up() {
        let pool = test_pool().await;
        let store = SqliteStore::new(pool.clone());
        let now = OffsetDateTime::now_utc();

        let old = tower_sessions::Session::new(Some(Expiry::AtDateTime(now - time::Duration::days(1))));
        old.insert(DATA_KEY, SessionData::default()).unwrap();
        store.save(&old).await.unwrap();

        let live = tower_sessions::Session::new(Some(Expiry::AtDateTime(now + time::Duration::days(1))));
        live.insert(DATA_KEY, SessionData::default()).unwrap();
        store.save(&live).await.unwrap();

        assert!(store.load(old.id()).await.unwrap().is_none());
        assert!(store.load(live.id()).await.unwrap().is_some());

        store.delete_expired().await.unwrap();
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tower_sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
