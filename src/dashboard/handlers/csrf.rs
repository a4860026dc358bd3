//! CSRF token issue and check.
//!
//! `GET /rocketmq-dashboard/csrf-token` stores a fresh token on the caller's
//! session (starting one if needed). The state-changing login routes then
//! require that token back in the `X-XSRF-TOKEN` header.

use axum::{
    extract::{Extension, Request, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::dashboard::{cookie, AppState};

/// Session attribute holding the last token handed out.
pub const CSRF_SESSION_ATTRIBUTE: &str = "csrf_token";

pub const CSRF_HEADER: &str = "X-XSRF-TOKEN";

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CsrfToken {
    token: String,
    header_name: String,
}

fn generate_token() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[utoipa::path(
    get,
    path = "/rocketmq-dashboard/csrf-token",
    responses(
        (status = 200, description = "Fresh CSRF token bound to the caller's session; reachable without a login", body = CsrfToken),
    ),
    tag = "csrf"
)]
pub async fn csrf_token(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let token = generate_token();
    let sessions = state.sessions();

    let existing = cookie::extract_session_id(&headers).filter(|id| sessions.get(id).is_some());

    let mut response_headers = HeaderMap::new();
    let id = if let Some(id) = existing {
        id
    } else {
        let session = sessions.create();
        match cookie::session_cookie(state.config(), session.id(), sessions.ttl().as_secs()) {
            Ok(value) => {
                response_headers.insert(SET_COOKIE, value);
            }
            Err(e) => {
                error!("Failed to build session cookie: {}", e);
                sessions.invalidate(session.id());
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
        session.id().to_string()
    };

    sessions.set_attribute(&id, CSRF_SESSION_ATTRIBUTE, token.clone());

    (
        response_headers,
        Json(CsrfToken {
            token,
            header_name: CSRF_HEADER.to_string(),
        }),
    )
        .into_response()
}

/// Middleware rejecting requests whose `X-XSRF-TOKEN` does not match the
/// token stored on their session.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let expected = cookie::extract_session_id(request.headers())
        .and_then(|id| state.sessions().get(&id))
        .and_then(|session| session.attribute(CSRF_SESSION_ATTRIBUTE).map(str::to_string));

    let presented = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok());

    match (expected.as_deref(), presented) {
        (Some(expected), Some(presented)) if expected == presented => next.run(request).await,
        _ => {
            warn!("rejected {} {}: missing or mismatched CSRF token", request.method(), request.uri().path());
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let first = generate_token();
        let second = generate_token();
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(first, second);
    }
}
