//! Login endpoints used by the dashboard's `/#/login` page.
//!
//! These routes are never gated: they are how a session acquires its username.
//! The POST routes sit behind [`csrf::require_token`](super::csrf::require_token).

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Json},
    Form,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use super::{csrf::CSRF_SESSION_ATTRIBUTE, LoginResult, STATUS_OK};
use crate::{
    auth::USER_NAME,
    dashboard::{cookie, AppState},
};

const BAD_CREDENTIALS: &str = "Bad username or password!";

#[derive(ToSchema, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginInfo {
    login_required: bool,
    logined: bool,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct CheckResult {
    status: i32,
    data: LoginInfo,
}

#[utoipa::path(
    get,
    path = "/login/check.query",
    responses(
        (status = 200, description = "Whether a login is required and whether the caller has one", body = CheckResult),
    ),
    tag = "login"
)]
pub async fn check(state: Extension<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let logined = cookie::extract_session_id(&headers)
        .and_then(|id| state.sessions().get(&id))
        .is_some_and(|session| session.attribute(USER_NAME).is_some());

    Json(CheckResult {
        status: STATUS_OK,
        data: LoginInfo {
            login_required: state.config().login_required(),
            logined,
        },
    })
}

#[utoipa::path(
    post,
    path = "/login/login.do",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    params(
        ("X-XSRF-TOKEN" = String, Header, description = "Token from /rocketmq-dashboard/csrf-token"),
    ),
    responses(
        (status = 200, description = "status 0 with the context path on success, -1 with errMsg otherwise", body = LoginResult),
        (status = 403, description = "Missing or mismatched CSRF token"),
    ),
    tag = "login"
)]
#[instrument(skip(state, headers))]
pub async fn login(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> impl IntoResponse {
    let Some(user) = state.users().verify_credentials(&form.username, &form.password) else {
        warn!("rejected login for {}", form.username);
        return Json(LoginResult::failed(BAD_CREDENTIALS)).into_response();
    };

    // A fresh session id on every login; the CSRF token moves along with it.
    let previous = cookie::extract_session_id(&headers);
    let csrf = previous
        .as_deref()
        .and_then(|id| state.sessions().get(id))
        .and_then(|session| session.attribute(CSRF_SESSION_ATTRIBUTE).map(str::to_string));
    if let Some(previous) = previous {
        state.sessions().invalidate(&previous);
    }

    let session = state.sessions().create();
    state
        .sessions()
        .set_attribute(session.id(), USER_NAME, user.username());
    if let Some(csrf) = csrf {
        state
            .sessions()
            .set_attribute(session.id(), CSRF_SESSION_ATTRIBUTE, csrf);
    }

    let mut response_headers = HeaderMap::new();
    match cookie::session_cookie(
        state.config(),
        session.id(),
        state.sessions().ttl().as_secs(),
    ) {
        Ok(value) => {
            response_headers.insert(SET_COOKIE, value);
        }
        Err(e) => {
            error!("Failed to build session cookie: {}", e);
            state.sessions().invalidate(session.id());
            return Json(LoginResult::failed("Failed to start session")).into_response();
        }
    }

    info!("user {} logged in", user.username());

    (
        response_headers,
        Json(LoginResult::ok(state.config().context_path())),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/login/logout.do",
    params(
        ("X-XSRF-TOKEN" = String, Header, description = "Token from /rocketmq-dashboard/csrf-token"),
    ),
    responses(
        (status = 200, description = "Session cleared", body = LoginResult),
        (status = 403, description = "Missing or mismatched CSRF token"),
    ),
    tag = "login"
)]
pub async fn logout(state: Extension<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(id) = cookie::extract_session_id(&headers) {
        state.sessions().invalidate(&id);
    }

    // Always clear the cookie, even if the session was already gone.
    let mut response_headers = HeaderMap::new();
    if let Ok(value) = cookie::clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, value);
    }

    (
        response_headers,
        Json(LoginResult::ok(state.config().context_path())),
    )
}
