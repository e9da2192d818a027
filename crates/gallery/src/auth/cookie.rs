//! Transport of the session token in the `jwt` cookie.

use axum::http::{HeaderMap, HeaderValue, header};
use cookie::{Cookie, time::Duration};

use crate::config::CookieConfig;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "jwt";

const SESSION_MAX_AGE: Duration = Duration::hours(24);

/// `Set-Cookie` value that stores `token` for the lifetime of a token.
#[must_use]
pub fn session_cookie(token: &str, config: CookieConfig) -> Cookie<'static> {
    build(token.to_owned(), SESSION_MAX_AGE, config)
}

/// `Set-Cookie` value that overwrites the session with an empty, expired cookie.
#[must_use]
pub fn cleared_cookie(config: CookieConfig) -> Cookie<'static> {
    build(String::new(), Duration::ZERO, config)
}

fn build(value: String, max_age: Duration, config: CookieConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .path("/")
        .max_age(max_age)
        .secure(config.secure)
        .same_site(config.same_site)
        .build()
}

/// Render a cookie as a header value.
///
/// Returns `None` if the cookie contains bytes not allowed in headers.
#[must_use]
pub fn header_value(cookie: &Cookie<'_>) -> Option<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string()).ok()
}

/// Extract the session token from the request's `Cookie` headers.
///
/// Empty values (a cleared cookie echoed back) count as absent.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cookie::SameSite;

    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc.def.ghi", CookieConfig::default());
        assert_eq!(cookie.name(), "jwt");
        assert_eq!(cookie.value(), "abc.def.ghi");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::hours(24)));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_ne!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_secure_flag_follows_config() {
        let cookie = session_cookie(
            "t",
            CookieConfig {
                secure: true,
                same_site: SameSite::Strict,
            },
        );
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn test_cleared_cookie_expires_immediately() {
        let cookie = cleared_cookie(CookieConfig::default());
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        let rendered = header_value(&cookie).unwrap();
        assert!(rendered.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn test_session_token_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=abc.def.ghi; lang=da"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_session_token_missing_or_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("jwt="));
        assert_eq!(session_token(&headers), None);
    }
}
