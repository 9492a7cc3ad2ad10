//! Typed per-request state produced by the middleware chain.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Datelike, Utc};

use crate::csrf::CsrfToken;
use crate::error::AppError;
use crate::session::{Session, SessionError};
use crate::views::TemplateData;

/// Who is making the request.
///
/// A session that names a user is only trusted once that user has been found
/// in the database on the current request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Anonymous,
    Unverified(i64),
    Verified(i64),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Verified(_))
    }
}

/// Everything a page handler needs from the middleware chain.
pub struct RequestContext {
    pub session: Session,
    pub auth: AuthState,
    pub csrf_token: CsrfToken,
}

impl RequestContext {
    /// Common page data. Reading it consumes any pending flash message.
    pub fn template_data(&self) -> Result<TemplateData, SessionError> {
        Ok(TemplateData {
            current_year: Utc::now().year(),
            flash: self.session.pop_flash()?,
            is_authenticated: self.auth.is_authenticated(),
            csrf_token: self.csrf_token.0.clone(),
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let csrf_token = CsrfToken::from_request_parts(parts, state).await?;
        let auth = parts.extensions.get::<AuthState>().copied().unwrap_or_default();

        Ok(Self {
            session,
            auth,
            csrf_token,
        })
    }
}
