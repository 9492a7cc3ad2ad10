use std::any::Any;

use axum::body::{Body, Bytes, Full};
use axum::extract::State;
use axum::http::{
    header, HeaderMap, HeaderValue, Method, Request, Response as HttpResponse, StatusCode,
};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{Level, Span};

use crate::context::AuthState;
use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com";

pub async fn secure_headers(request: Request<Body>, next: Next<Body>) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("origin-when-cross-origin"),
    );
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("deny"));
    headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("0"));

    response
}

pub fn request_span(request: &Request<Body>) -> Span {
    tracing::span!(
        Level::INFO,
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

/// Converts a panic anywhere below into a bare 500 and drops the connection.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> HttpResponse<Full<Bytes>> {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(
        panic = message,
        backtrace = %std::backtrace::Backtrace::force_capture(),
        "handler panicked"
    );

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let body = Full::from(status.canonical_reason().unwrap_or_default());
    let mut response = HttpResponse::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Adds `Vary: Cookie` once to any response that sets a cookie.
pub async fn vary_on_cookie(request: Request<Body>, next: Next<Body>) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    if headers.contains_key(header::SET_COOKIE) && !varies_on_cookie(headers) {
        headers.append(header::VARY, HeaderValue::from_static("Cookie"));
    }

    response
}

fn varies_on_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|name| name.trim().eq_ignore_ascii_case("cookie"))
}

/// Works out the [`AuthState`] for the request.
///
/// A user id in the session is re-checked against the users table on every
/// request, so a deleted account stops working immediately. The stale id is
/// then dropped from the session.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let session = Session::from_extensions(request.extensions());
    let user_id = match &session {
        Some(session) => session.user_id()?,
        None => None,
    };

    let auth = match (user_id, &session) {
        (Some(id), Some(session)) => {
            if state.users.exists(id).await? {
                AuthState::Verified(id)
            } else {
                tracing::debug!(user_id = id, "session refers to a missing user");
                session.remove_user_id()?;
                AuthState::Unverified(id)
            }
        }
        _ => AuthState::Anonymous,
    };

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

pub async fn require_authentication(
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let auth = request
        .extensions()
        .get::<AuthState>()
        .copied()
        .unwrap_or_default();

    if !auth.is_authenticated() {
        if request.method() == Method::GET {
            if let Some(session) = Session::from_extensions(request.extensions()) {
                let target = request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| request.uri().path().to_string());
                session.put_redirect_after_login(target)?;
            }
        }
        return Ok(Redirect::to("/user/login").into_response());
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}
