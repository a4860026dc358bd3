use utoipa::OpenApi;

use super::handlers::{self, csrf, health, login, user};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        login::check,
        login::login,
        login::logout,
        csrf::csrf_token,
        user::current,
    ),
    components(schemas(
        health::Health,
        handlers::LoginResult,
        login::LoginForm,
        login::LoginInfo,
        login::CheckResult,
        csrf::CsrfToken,
        user::CurrentUser,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "login", description = "Dashboard login session"),
        (name = "csrf", description = "CSRF token, reachable without a login"),
        (name = "user", description = "Authenticated user"),
    )
)]
struct ApiDoc;

/// OpenAPI document of the dashboard routes.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/login/check.query",
            "/login/login.do",
            "/login/logout.do",
            "/rocketmq-dashboard/csrf-token",
            "/user/current.query",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
