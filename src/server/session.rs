//! Session identifier extraction from request cookies.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// The value of cookie `name`, if present and non-empty.
///
/// Looks through every `Cookie` header; the first match wins.
pub fn session_from_headers(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for cookie in cookies {
            map.append(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        map
    }

    #[test]
    fn finds_named_cookie() {
        let h = headers(&["theme=dark; sid=abc123; lang=en"]);
        assert_eq!(session_from_headers(&h, "sid"), Some("abc123".to_string()));
    }

    #[test]
    fn searches_every_cookie_header() {
        let h = headers(&["theme=dark", "sid=xyz"]);
        assert_eq!(session_from_headers(&h, "sid"), Some("xyz".to_string()));
    }

    #[test]
    fn strips_quotes() {
        let h = headers(&[r#"sid="q1""#]);
        assert_eq!(session_from_headers(&h, "sid"), Some("q1".to_string()));
    }

    #[test]
    fn missing_or_empty_is_none() {
        assert_eq!(session_from_headers(&headers(&["theme=dark"]), "sid"), None);
        assert_eq!(session_from_headers(&headers(&["sid="]), "sid"), None);
        assert_eq!(session_from_headers(&HeaderMap::new(), "sid"), None);
    }

    #[test]
    fn name_must_match_exactly() {
        let h = headers(&["xsid=nope"]);
        assert_eq!(session_from_headers(&h, "sid"), None);
    }
}
