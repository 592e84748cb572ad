use std::time::Duration;

use axum::http::{header, HeaderMap};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

const EPOCH_EXPIRY: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Set-Cookie value for a session token. `Secure` is set only when the
/// service runs in production.
pub fn session_cookie(name: &str, value: &str, max_age: Duration, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{name}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{secure_flag}",
        max_age.as_secs()
    )
}

/// Set-Cookie value that removes a cookie: empty value, expiry in the past.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{name}=; HttpOnly; SameSite=Strict; Path=/; Expires={EPOCH_EXPIRY}{secure_flag}")
}

/// Value of a named cookie from the request's Cookie header, if present
/// and non-empty.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for cookie in cookie_header.split(';') {
        if let Some((key, value)) = cookie.trim().split_once('=') {
            if key == name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_sets_security_flags() {
        let cookie = session_cookie(ACCESS_COOKIE, "tok", Duration::from_secs(900), false);
        assert!(cookie.starts_with("access_token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=900"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn session_cookie_secure_in_production() {
        let cookie = session_cookie(REFRESH_COOKIE, "tok", Duration::from_secs(604800), true);
        assert!(cookie.contains("Max-Age=604800"));
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_in_the_past_with_empty_value() {
        let cookie = clear_cookie(ACCESS_COOKIE, false);
        assert!(cookie.starts_with("access_token=;"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(!cookie.contains("Max-Age"));
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc123; refresh_token=def456"),
        );
        assert_eq!(cookie_value(&headers, ACCESS_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE).as_deref(), Some("def456"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn cookie_value_ignores_empty_and_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token="));
        assert_eq!(cookie_value(&headers, ACCESS_COOKIE), None);
        assert_eq!(cookie_value(&HeaderMap::new(), ACCESS_COOKIE), None);
    }
}
