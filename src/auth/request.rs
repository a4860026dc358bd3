//! Request and response views consumed by the decision core.

use anyhow::Result;

use super::{session::SessionProvider, LOGIN_PAGE};

/// Read-only view of an inbound request.
pub trait AuthRequest: SessionProvider {
    fn method(&self) -> Option<&str>;

    /// Scheme, host and path of the request, without the query string.
    fn request_url(&self) -> Option<&str>;

    /// Path the request addressed, context path included. Path-based rules
    /// match against this rather than the full URL.
    fn request_path(&self) -> Option<&str> {
        self.request_url()
    }

    fn query_string(&self) -> Option<&str>;

    /// Mount prefix of the dashboard, empty when served from the root.
    fn context_path(&self) -> &str;
}

/// Redirect primitive of the response being built.
pub trait Redirector {
    /// # Errors
    /// Returns an error if the redirect cannot be written.
    fn send_redirect(&mut self, location: &str) -> Result<()>;
}

/// Login page location that sends the browser back to the original URL.
///
/// The original URL and query string are appended verbatim.
#[must_use]
pub fn login_redirect_target<R: AuthRequest + ?Sized>(request: &R) -> String {
    let mut original = request.request_url().unwrap_or_default().to_string();
    if let Some(query) = request.query_string().filter(|query| !query.is_empty()) {
        original.push('?');
        original.push_str(query);
    }

    format!(
        "{}{LOGIN_PAGE}?redirect={original}",
        request.context_path()
    )
}
