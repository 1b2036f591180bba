//! HTTP surface for freshness checks.
//!
//! Routes:
//! - `GET /`: liveness, answers `weloveyou.`
//! - `GET /{project_id}`: `true` if the caller's session must refresh its
//!   view of the project, `false` otherwise (`text/html`). With
//!   `?callback=name` the body is wrapped as `name(true)` for JSONP callers.
//!
//! The session comes from a cookie (see [`session`]). A request without one
//! is answered `true` without touching the cache: an unknown session has
//! never checked in.

pub mod config;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tracing::{debug, error};

use crate::freshness::FreshnessEvaluator;

/// Shared state handed to every request.
#[derive(Clone)]
pub struct AppState {
    evaluator: Arc<FreshnessEvaluator>,
    session_cookie: Arc<str>,
}

impl AppState {
    pub fn new(evaluator: Arc<FreshnessEvaluator>, session_cookie: impl Into<Arc<str>>) -> Self {
        Self {
            evaluator,
            session_cookie: session_cookie.into(),
        }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/:project_id", get(check))
        .with_state(state)
}

async fn index() -> &'static str {
    "weloveyou."
}

#[derive(Debug, Deserialize)]
struct CheckParams {
    callback: Option<String>,
}

async fn check(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(params): Query<CheckParams>,
    headers: HeaderMap,
) -> Response {
    if let Some(callback) = params.callback.as_deref() {
        if !is_valid_callback(callback) {
            return (StatusCode::BAD_REQUEST, "invalid callback").into_response();
        }
    }

    let refresh = match session::session_from_headers(&headers, &state.session_cookie) {
        Some(session_id) => match state.evaluator.refresh_my_view(&project_id, &session_id).await
        {
            Ok(refresh) => refresh,
            Err(e) => {
                error!(%project_id, error = %e, "freshness check failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "cache unavailable").into_response();
            }
        },
        None => {
            debug!(%project_id, "no session cookie, requesting refresh");
            true
        }
    };

    match params.callback {
        Some(callback) => (
            [(header::CONTENT_TYPE, "application/javascript")],
            format!("{callback}({refresh})"),
        )
            .into_response(),
        None => ([(header::CONTENT_TYPE, "text/html")], refresh.to_string()).into_response(),
    }
}

/// JSONP callback names: JavaScript identifiers, optionally dotted.
fn is_valid_callback(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_names() {
        assert!(is_valid_callback("cb"));
        assert!(is_valid_callback("jQuery123_456"));
        assert!(is_valid_callback("app.handlers.$fresh"));
        assert!(!is_valid_callback(""));
        assert!(!is_valid_callback("1cb"));
        assert!(!is_valid_callback("alert(1)"));
        assert!(!is_valid_callback("a..b"));
        assert!(!is_valid_callback("<script>"));
    }
}
