//! Authentication decision core.
//!
//! Flow Overview: the [`RequestGate`] screens each request for bypass guards and
//! otherwise delegates to an [`Authenticate`] implementation, normally the
//! [`SessionAuthenticator`]. Both only read the request; the collaborators they
//! touch (session store, user directory, redirect sink) sit behind the traits in
//! [`request`], [`session`] and [`users`].

pub mod authenticator;
pub mod context;
pub mod gate;
pub mod request;
pub mod session;
pub mod users;

pub use authenticator::{Authenticate, SessionAuthenticator};
pub use context::RequestContext;
pub use gate::RequestGate;
pub use request::{AuthRequest, Redirector, login_redirect_target};
pub use session::{Session, SessionProvider, SessionStore};
pub use users::{FileUserStore, UserDirectory, UserInfo, UserRole};

/// Session attribute (and request-context key) holding the authenticated username.
pub const USER_NAME: &str = "username";

/// Front-end route of the login page.
pub const LOGIN_PAGE: &str = "/#/login";

/// Requests whose URL contains this path skip authentication.
pub const CSRF_TOKEN_PATH: &str = "/rocketmq-dashboard/csrf-token";

/// Terminal outcome of one request evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Bypassed,
    Authenticated,
    Redirected,
}

impl Decision {
    /// Whether the request may continue to the business handlers.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Bypassed | Self::Authenticated)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bypassed => "bypassed",
            Self::Authenticated => "authenticated",
            Self::Redirected => "redirected",
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Authenticated
        } else {
            Self::Redirected
        }
    }
}
