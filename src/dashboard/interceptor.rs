//! Axum adapter that runs every gated request through the
//! [`RequestGate`](crate::auth::RequestGate).
//!
//! Flow Overview: wrap the incoming request in an [`HttpRequest`] view, let the
//! gate decide, then either forward the request (with the resolved
//! [`RequestContext`] in its extensions) or answer with the login redirect.

use anyhow::{Context, Result};
use axum::{
    extract::{OriginalUri, Request, State},
    http::{
        header::{HOST, LOCATION},
        uri::Authority,
        HeaderMap, HeaderValue, StatusCode, Uri,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{cookie, AppState};
use crate::auth::{AuthRequest, Redirector, RequestContext, Session, SessionProvider, SessionStore};

/// Read-only [`AuthRequest`] view over an HTTP request.
pub struct HttpRequest<'a> {
    method: String,
    path: String,
    request_url: Option<String>,
    query: Option<String>,
    context_path: &'a str,
    session_id: Option<String>,
    sessions: &'a SessionStore,
}

impl<'a> HttpRequest<'a> {
    #[must_use]
    pub fn new(
        method: &str,
        uri: &Uri,
        headers: &HeaderMap,
        context_path: &'a str,
        sessions: &'a SessionStore,
    ) -> Self {
        Self {
            method: method.to_string(),
            path: uri.path().to_string(),
            request_url: request_url(uri, headers),
            query: uri.query().map(ToString::to_string),
            context_path,
            session_id: cookie::extract_session_id(headers),
            sessions,
        }
    }
}

impl SessionProvider for HttpRequest<'_> {
    /// Sessions are only ever read here; `/login/login.do` is what starts them.
    fn session(&self, create: bool) -> Option<Session> {
        debug_assert!(!create, "gated requests never start a session");

        self.session_id
            .as_deref()
            .and_then(|id| self.sessions.get(id))
    }
}

impl AuthRequest for HttpRequest<'_> {
    fn method(&self) -> Option<&str> {
        Some(&self.method)
    }

    fn request_url(&self) -> Option<&str> {
        self.request_url.as_deref()
    }

    fn request_path(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn context_path(&self) -> &str {
        self.context_path
    }
}

/// Scheme, host and path as the browser addressed them, without the query.
///
/// Only a `Host` that parses as an authority is used, and only `http`/`https`
/// are accepted from `X-Forwarded-Proto`; otherwise the URL degrades to the
/// path (bad host) or the `http` scheme (bad proto).
fn request_url(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    let path = uri.path();

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Authority>().ok())
        .or_else(|| uri.authority().cloned());

    let Some(host) = host else {
        return Some(path.to_string());
    };

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .or_else(|| uri.scheme_str())
        .filter(|scheme| matches!(*scheme, "http" | "https"))
        .unwrap_or("http");

    Some(format!("{scheme}://{host}{path}"))
}

/// Captures the redirect issued by the authenticator.
#[derive(Debug, Default)]
pub struct RedirectSink {
    location: Option<HeaderValue>,
}

impl RedirectSink {
    #[must_use]
    pub fn location(&self) -> Option<&HeaderValue> {
        self.location.as_ref()
    }
}

impl Redirector for RedirectSink {
    fn send_redirect(&mut self, location: &str) -> Result<()> {
        let value = HeaderValue::from_str(location)
            .with_context(|| format!("Invalid redirect location: {location}"))?;
        self.location = Some(value);
        Ok(())
    }
}

impl IntoResponse for RedirectSink {
    fn into_response(self) -> Response {
        match self.location {
            Some(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
            None => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Middleware guarding the dashboard routes.
pub async fn auth_interceptor(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut context = RequestContext::new();
    let mut redirect = RedirectSink::default();

    let verdict = {
        let uri = request
            .extensions()
            .get::<OriginalUri>()
            .map_or_else(|| request.uri().clone(), |original| original.0.clone());

        let view = HttpRequest::new(
            request.method().as_str(),
            &uri,
            request.headers(),
            state.config().context_path(),
            state.sessions(),
        );

        state.gate().evaluate(&view, &mut redirect, &mut context)
    };

    match verdict {
        Ok(decision) if decision.is_allowed() => {
            debug!("request {}", decision.as_str());
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Ok(decision) => {
            debug!("request {}", decision.as_str());
            redirect.into_response()
        }
        Err(e) => {
            error!("Failed to authenticate request: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::USER_NAME;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn request_url_from_host_header() {
        let uri: Uri = "/topic/list.query?skipSysProcess=true".parse().unwrap();
        let url = request_url(&uri, &headers(&[("host", "localhost:8080")]));
        assert_eq!(url.as_deref(), Some("http://localhost:8080/topic/list.query"));
    }

    #[test]
    fn request_url_honours_forwarded_proto() {
        let uri: Uri = "/some-api".parse().unwrap();
        let url = request_url(
            &uri,
            &headers(&[("host", "dashboard.tld"), ("x-forwarded-proto", "https, http")]),
        );
        assert_eq!(url.as_deref(), Some("https://dashboard.tld/some-api"));
    }

    #[test]
    fn request_url_without_host_is_path_only() {
        let uri: Uri = "/some-api".parse().unwrap();
        assert_eq!(request_url(&uri, &HeaderMap::new()).as_deref(), Some("/some-api"));
    }

    #[test]
    fn view_reads_session_without_creating() {
        let store = SessionStore::default();
        let session = store.create();
        store.set_attribute(session.id(), USER_NAME, "mars");

        let cookie = format!("{}={}", cookie::SESSION_COOKIE_NAME, session.id());
        let mut map = HeaderMap::new();
        map.insert(axum::http::header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        let uri: Uri = "/user/current.query".parse().unwrap();

        let view = HttpRequest::new("GET", &uri, &map, "", &store);
        let fetched = view.session(false).unwrap();
        assert_eq!(fetched.attribute(USER_NAME), Some("mars"));
    }

    #[test]
    fn view_without_known_session_is_anonymous() {
        let store = SessionStore::default();
        let uri: Uri = "/some-api".parse().unwrap();

        let view = HttpRequest::new("GET", &uri, &HeaderMap::new(), "", &store);
        assert!(view.session(false).is_none());

        let mut map = HeaderMap::new();
        map.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("rmq_dashboard_session=gone"),
        );
        let view = HttpRequest::new("GET", &uri, &map, "", &store);
        assert!(view.session(false).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn request_url_ignores_host_that_is_not_an_authority() {
        let uri: Uri = "/user/current.query".parse().unwrap();
        let url = request_url(
            &uri,
            &headers(&[("host", "evil/rocketmq-dashboard/csrf-token")]),
        );
        assert_eq!(url.as_deref(), Some("/user/current.query"));
    }

    #[test]
    fn request_url_ignores_unknown_forwarded_proto() {
        let uri: Uri = "/user/current.query".parse().unwrap();
        let url = request_url(
            &uri,
            &headers(&[
                ("host", "localhost"),
                ("x-forwarded-proto", "/rocketmq-dashboard/csrf-token"),
            ]),
        );
        assert_eq!(url.as_deref(), Some("http://localhost/user/current.query"));
    }

    #[test]
    fn view_reports_path_for_path_rules() {
        let store = SessionStore::default();
        let uri: Uri = "/dashboard/user/current.query?x=1".parse().unwrap();
        let view = HttpRequest::new(
            "GET",
            &uri,
            &headers(&[("host", "localhost")]),
            "/dashboard",
            &store,
        );
        assert_eq!(view.request_path(), Some("/dashboard/user/current.query"));
        assert_eq!(
            view.request_url(),
            Some("http://localhost/dashboard/user/current.query")
        );
    }

    #[test]
    fn redirect_sink_builds_found_response() {
        let mut sink = RedirectSink::default();
        sink.send_redirect("/#/login?redirect=http://localhost/some-api")
            .unwrap();
        assert_eq!(
            sink.location().unwrap(),
            "/#/login?redirect=http://localhost/some-api"
        );

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/#/login?redirect=http://localhost/some-api"
        );
    }

    #[test]
    fn redirect_sink_rejects_invalid_location() {
        let mut sink = RedirectSink::default();
        assert!(sink.send_redirect("/#/login?redirect=\n").is_err());
        assert!(sink.location().is_none());
    }
}
