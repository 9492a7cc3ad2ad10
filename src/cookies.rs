use axum::http::{header, HeaderMap, HeaderValue};
use cookie::{Cookie, SameSite};
use rand::RngCore;

/// 32 random bytes, hex encoded.
pub fn random_token() -> String {
    let mut buf = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

/// An HttpOnly cookie scoped to the whole site.
pub fn site_cookie(
    name: &'static str,
    value: String,
    secure: bool,
    max_age_secs: Option<i64>,
) -> Cookie<'static> {
    let mut builder = Cookie::build(name, value)
        .http_only(true)
        .secure(secure)
        .path("/")
        .same_site(SameSite::Lax);

    if let Some(secs) = max_age_secs {
        builder = builder.max_age(cookie::time::Duration::seconds(secs));
    }

    builder.finish()
}

pub fn append_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(err) => tracing::warn!(error = %err, name = cookie.name(), "unencodable cookie"),
    }
}
