//! Session cookie helpers.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

use super::DashboardConfig;

pub const SESSION_COOKIE_NAME: &str = "rmq_dashboard_session";

fn cookie_path(config: &DashboardConfig) -> &str {
    if config.context_path().is_empty() {
        "/"
    } else {
        config.context_path()
    }
}

/// Build the `HttpOnly` cookie carrying a session id.
pub fn session_cookie(
    config: &DashboardConfig,
    session_id: &str,
    max_age_seconds: u64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path={}; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}",
        cookie_path(config)
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_session_cookie(config: &DashboardConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}=; Path={}; HttpOnly; SameSite=Lax; Max-Age=0",
        cookie_path(config)
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Session id from the request cookies, if any.
#[must_use]
pub fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty())
                .then(|| val.trim().to_string())
        })
}
