//! Double-submit CSRF protection.
//!
//! Each client gets a random token in the `csrf_token` cookie. Pages embed the
//! same token in a hidden form field, and any state-changing request must send
//! it back, either in that field or in the `X-CSRF-Token` header.

use axum::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use http_body::{LengthLimitError, Limited};

use crate::cookies::{append_cookie, random_token, read_cookie, site_cookie};
use crate::error::AppError;
use crate::state::AppState;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_FIELD: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

const MAX_FORM_BYTES: usize = 1 << 20;
const TOKEN_MAX_AGE_SECS: i64 = 365 * 24 * 60 * 60;

/// The token to embed in forms rendered for this request.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

fn is_well_formed(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn tokens_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn is_form(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

/// Pulls the submitted token out of the request, buffering a form body if
/// needed and putting it back for the handler.
async fn submitted_token(request: Request<Body>) -> Result<(Request<Body>, Option<String>), AppError> {
    if let Some(token) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        let token = token.to_string();
        return Ok((request, Some(token)));
    }

    if !is_form(&request) {
        return Ok((request, None));
    }

    let too_large = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        .is_some_and(|len| len > MAX_FORM_BYTES);
    if too_large {
        return Err(AppError::ClientError(StatusCode::PAYLOAD_TOO_LARGE));
    }

    // Chunked bodies carry no length, so the cap also applies while reading.
    let (parts, body) = request.into_parts();
    let bytes = hyper::body::to_bytes(Limited::new(body, MAX_FORM_BYTES))
        .await
        .map_err(|err| {
            if err.is::<LengthLimitError>() {
                AppError::ClientError(StatusCode::PAYLOAD_TOO_LARGE)
            } else {
                AppError::ClientError(StatusCode::BAD_REQUEST)
            }
        })?;

    let token = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
        .map_err(|_| AppError::ClientError(StatusCode::BAD_REQUEST))?
        .into_iter()
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value);

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

pub async fn verify(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let existing = read_cookie(request.headers(), CSRF_COOKIE).filter(|t| is_well_formed(t));

    let mut request = if is_safe(request.method()) {
        request
    } else {
        let (request, submitted) = submitted_token(request).await?;
        let valid = match (&existing, &submitted) {
            (Some(expected), Some(submitted)) => tokens_match(expected, submitted),
            _ => false,
        };
        if !valid {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "csrf token missing or invalid"
            );
            return Err(AppError::ClientError(StatusCode::BAD_REQUEST));
        }
        request
    };

    let token = existing.clone().unwrap_or_else(random_token);
    request.extensions_mut().insert(CsrfToken(token.clone()));

    let mut response = next.run(request).await;

    if existing.is_none() {
        let cookie = site_cookie(
            CSRF_COOKIE,
            token,
            state.config.cookies_secure(),
            Some(TOKEN_MAX_AGE_SECS),
        );
        append_cookie(response.headers_mut(), &cookie);
    }

    Ok(response)
}

#[async_trait]
impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("csrf layer is not installed")))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;

    use super::*;

    #[test]
    fn safe_methods() {
        assert!(is_safe(&Method::GET));
        assert!(is_safe(&Method::HEAD));
        assert!(!is_safe(&Method::POST));
        assert!(!is_safe(&Method::DELETE));
    }

    #[test]
    fn token_comparison() {
        let token = random_token();
        assert!(is_well_formed(&token));
        assert!(tokens_match(&token, &token.clone()));
        assert!(!tokens_match(&token, &random_token()));
        assert!(!tokens_match(&token, &token[..63]));
        assert!(!is_well_formed("not-a-token"));
    }

    #[tokio::test]
    async fn token_is_read_from_form_and_body_is_restored() {
        let request = Request::post("/user/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=a%40b.com&csrf_token=abc"))
            .unwrap();

        let (request, token) = submitted_token(request).await.unwrap();
        assert_eq!(token.as_deref(), Some("abc"));

        let body = hyper::body::to_bytes(request.into_body()).await.unwrap();
        assert_eq!(&body[..], b"email=a%40b.com&csrf_token=abc");
    }

    #[tokio::test]
    async fn form_body_is_capped_without_content_length() {
        let (mut sender, body) = Body::channel();
        tokio::spawn(async move {
            for _ in 0..8 {
                if sender.send_data(Bytes::from(vec![b'a'; 1 << 20])).await.is_err() {
                    break;
                }
            }
        });
        let request = Request::post("/user/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .unwrap();
        assert!(request.headers().get(header::CONTENT_LENGTH).is_none());

        let result = submitted_token(request).await;
        assert!(matches!(
            result,
            Err(AppError::ClientError(status)) if status == StatusCode::PAYLOAD_TOO_LARGE
        ));
    }

    #[tokio::test]
    async fn oversized_content_length_is_rejected_up_front() {
        let request = Request::post("/user/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::CONTENT_LENGTH, (MAX_FORM_BYTES + 1).to_string())
            .body(Body::empty())
            .unwrap();

        let result = submitted_token(request).await;
        assert!(matches!(
            result,
            Err(AppError::ClientError(status)) if status == StatusCode::PAYLOAD_TOO_LARGE
        ));
    }

    #[tokio::test]
    async fn header_token_wins() {
        let request = Request::post("/user/logout")
            .header(CSRF_HEADER, "from-header")
            .body(Body::empty())
            .unwrap();

        let (_, token) = submitted_token(request).await.unwrap();
        assert_eq!(token.as_deref(), Some("from-header"));
    }
}
