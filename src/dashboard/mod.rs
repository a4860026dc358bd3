//! HTTP surface of the dashboard: login endpoints, the gated routes and the
//! interceptor that puts the [`RequestGate`] in front of them.

use crate::auth::{FileUserStore, RequestGate, SessionAuthenticator, SessionStore, CSRF_TOKEN_PATH};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

pub mod cookie;
pub mod handlers;
pub mod interceptor;
mod openapi;

pub use openapi::openapi;

const DEFAULT_USERS_RELOAD_SECONDS: u64 = 30;
const SESSION_PURGE_SECONDS: u64 = 60;

/// Normalize a mount prefix: empty or `/` means root, otherwise one leading
/// slash and no trailing slash.
#[must_use]
pub fn normalize_context_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[derive(Clone, Debug)]
pub struct DashboardConfig {
    context_path: String,
    login_required: bool,
    cookie_secure: bool,
    allowed_origin: Option<String>,
    users_reload_seconds: u64,
}

impl DashboardConfig {
    #[must_use]
    pub fn new(context_path: impl AsRef<str>) -> Self {
        Self {
            context_path: normalize_context_path(context_path.as_ref()),
            login_required: true,
            cookie_secure: false,
            allowed_origin: None,
            users_reload_seconds: DEFAULT_USERS_RELOAD_SECONDS,
        }
    }

    #[must_use]
    pub fn with_login_required(mut self, required: bool) -> Self {
        self.login_required = required;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_allowed_origin(mut self, origin: Option<String>) -> Self {
        self.allowed_origin = origin;
        self
    }

    #[must_use]
    pub fn with_users_reload_seconds(mut self, seconds: u64) -> Self {
        self.users_reload_seconds = seconds;
        self
    }

    #[must_use]
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    #[must_use]
    pub const fn login_required(&self) -> bool {
        self.login_required
    }

    #[must_use]
    pub const fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn allowed_origin(&self) -> Option<&str> {
        self.allowed_origin.as_deref()
    }
}

/// Shared state handed to the interceptor and handlers.
pub struct AppState {
    config: DashboardConfig,
    users: Arc<FileUserStore>,
    sessions: Arc<SessionStore>,
    gate: RequestGate<SessionAuthenticator>,
}

impl AppState {
    #[must_use]
    pub fn new(config: DashboardConfig, users: Arc<FileUserStore>, sessions: Arc<SessionStore>) -> Self {
        let gate = RequestGate::new(SessionAuthenticator::new(users.clone()));
        Self {
            config,
            users,
            sessions,
            gate,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    #[must_use]
    pub fn users(&self) -> &FileUserStore {
        &self.users
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub const fn gate(&self) -> &RequestGate<SessionAuthenticator> {
        &self.gate
    }
}

/// Build the dashboard router, mounted under the configured context path.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    use handlers::{csrf, health, login, user};

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/login/check.query", get(login::check));

    let csrf_checked = Router::new()
        .route("/login/login.do", post(login::login))
        .route("/login/logout.do", post(login::logout))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            csrf::require_token,
        ));

    let mut gated = Router::new()
        .route(CSRF_TOKEN_PATH, get(csrf::csrf_token))
        .route("/user/current.query", get(user::current));

    // Without a login requirement the interceptor is not registered at all.
    if state.config().login_required() {
        gated = gated.layer(middleware::from_fn_with_state(
            state.clone(),
            interceptor::auth_interceptor,
        ));
    }

    let app = public
        .merge(csrf_checked)
        .merge(gated)
        .layer(Extension(state.clone()));

    let context_path = state.config().context_path();
    if context_path.is_empty() {
        app
    } else {
        Router::new().nest(context_path, app)
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    config: DashboardConfig,
    users: Arc<FileUserStore>,
    sessions: Arc<SessionStore>,
) -> Result<()> {
    FileUserStore::spawn_reload(
        users.clone(),
        Duration::from_secs(config.users_reload_seconds),
    );
    SessionStore::spawn_purge(sessions.clone(), Duration::from_secs(SESSION_PURGE_SECONDS));

    let cors = config
        .allowed_origin()
        .map(cors_layer)
        .transpose()?;

    let state = Arc::new(AppState::new(config, users, sessions));

    let mut app = router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let origin = browser_origin(allowed_origin)?;
    Ok(CorsLayer::new()
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-xsrf-token")])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true))
}

fn browser_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid allowed origin: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Allowed origin must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build allowed origin header")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn context_path_normalization() {
        assert_eq!(normalize_context_path(""), "");
        assert_eq!(normalize_context_path("/"), "");
        assert_eq!(normalize_context_path("dashboard"), "/dashboard");
        assert_eq!(normalize_context_path("/dashboard/"), "/dashboard");
        assert_eq!(normalize_context_path(" /a/b/ "), "/a/b");
    }

    #[test]
    fn config_defaults() {
        let config = DashboardConfig::new("/");
        assert_eq!(config.context_path(), "");
        assert!(config.login_required());
        assert!(!config.cookie_secure());
        assert!(config.allowed_origin().is_none());
    }

    #[test]
    fn browser_origin_strips_path() {
        let origin = browser_origin("https://dashboard.tld:8443/app/").unwrap();
        assert_eq!(origin, "https://dashboard.tld:8443");
        assert!(browser_origin("not a url").is_err());
    }
}
