//! Request gate: the single entry point every protected request passes.
//!
//! Preflight `OPTIONS` requests and CSRF token fetches bypass authentication;
//! everything else gets the authenticator's verdict verbatim.

use anyhow::Result;
use tracing::{debug, instrument};

use super::{
    authenticator::Authenticate,
    context::RequestContext,
    request::{AuthRequest, Redirector},
    Decision, CSRF_TOKEN_PATH,
};

#[derive(Clone, Debug)]
pub struct RequestGate<A> {
    authenticator: A,
}

impl<A: Authenticate> RequestGate<A> {
    #[must_use]
    pub const fn new(authenticator: A) -> Self {
        Self { authenticator }
    }

    #[must_use]
    pub const fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Whether the request skips authentication altogether.
    #[must_use]
    pub fn bypasses<R: AuthRequest + ?Sized>(request: &R) -> bool {
        if request.method() == Some("OPTIONS") {
            return true;
        }

        request
            .request_path()
            .is_some_and(|path| path.contains(CSRF_TOKEN_PATH))
    }

    /// Evaluate the request, returning the terminal decision.
    ///
    /// # Errors
    /// Propagates the authenticator's errors unchanged.
    #[instrument(skip_all, fields(method = request.method().unwrap_or_default()))]
    pub fn evaluate<R, W>(
        &self,
        request: &R,
        response: &mut W,
        context: &mut RequestContext,
    ) -> Result<Decision>
    where
        R: AuthRequest + ?Sized,
        W: Redirector + ?Sized,
    {
        if Self::bypasses(request) {
            debug!("authentication bypassed");
            return Ok(Decision::Bypassed);
        }

        let allowed = self
            .authenticator
            .authenticate(request, response, context)?;

        Ok(Decision::from(allowed))
    }

    /// Returns true when the request may proceed to its handler.
    ///
    /// # Errors
    /// Propagates the authenticator's errors unchanged.
    pub fn admit<R, W>(
        &self,
        request: &R,
        response: &mut W,
        context: &mut RequestContext,
    ) -> Result<bool>
    where
        R: AuthRequest + ?Sized,
        W: Redirector + ?Sized,
    {
        self.evaluate(request, response, context)
            .map(Decision::is_allowed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::request::testing::{FakeRequest, RecordingRedirector};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Authenticator double returning scripted verdicts and counting calls.
    #[derive(Default)]
    struct ScriptedAuthenticator {
        verdicts: Mutex<VecDeque<bool>>,
        calls: Mutex<usize>,
    }

    impl ScriptedAuthenticator {
        fn returning(verdicts: &[bool]) -> Self {
            Self {
                verdicts: Mutex::new(verdicts.iter().copied().collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    impl Authenticate for ScriptedAuthenticator {
        fn authenticate<R, W>(
            &self,
            _request: &R,
            _response: &mut W,
            _context: &mut RequestContext,
        ) -> Result<bool>
        where
            R: AuthRequest + ?Sized,
            W: Redirector + ?Sized,
        {
            *self.calls.lock() += 1;
            Ok(self.verdicts.lock().pop_front().unwrap_or(false))
        }
    }

    #[test]
    fn options_bypasses_authentication() {
        let gate = RequestGate::new(ScriptedAuthenticator::returning(&[false]));
        let request = FakeRequest {
            method: Some("OPTIONS".to_string()),
            ..FakeRequest::default()
        };
        let mut response = RecordingRedirector::default();
        let mut context = RequestContext::new();

        assert!(gate.admit(&request, &mut response, &mut context).unwrap());
        assert_eq!(gate.authenticator().calls(), 0);
        assert!(response.redirects.is_empty());
    }

    #[test]
    fn options_match_is_case_sensitive() {
        let gate = RequestGate::new(ScriptedAuthenticator::returning(&[false]));
        let mut request = FakeRequest::get("http://localhost/some-api");
        request.method = Some("options".to_string());
        let mut response = RecordingRedirector::default();
        let mut context = RequestContext::new();

        assert!(!gate.admit(&request, &mut response, &mut context).unwrap());
        assert_eq!(gate.authenticator().calls(), 1);
    }

    #[test]
    fn csrf_token_bypasses_authentication() {
        let gate = RequestGate::new(ScriptedAuthenticator::returning(&[false]));
        let request = FakeRequest::get("http://localhost/rocketmq-dashboard/csrf-token");
        let mut response = RecordingRedirector::default();
        let mut context = RequestContext::new();

        let decision = gate.evaluate(&request, &mut response, &mut context).unwrap();

        assert_eq!(decision, Decision::Bypassed);
        assert_eq!(gate.authenticator().calls(), 0);
    }

    #[test]
    fn csrf_match_ignores_host_part_of_url() {
        let gate = RequestGate::new(ScriptedAuthenticator::returning(&[false]));
        let mut request =
            FakeRequest::get("http://evil/rocketmq-dashboard/csrf-token/user/current.query");
        request.path = Some("/user/current.query".to_string());
        let mut response = RecordingRedirector::default();
        let mut context = RequestContext::new();

        let decision = gate.evaluate(&request, &mut response, &mut context).unwrap();

        assert_eq!(decision, Decision::Redirected);
        assert_eq!(gate.authenticator().calls(), 1);
    }

    #[test]
    fn normal_request_delegates_to_authenticator() {
        let gate = RequestGate::new(ScriptedAuthenticator::returning(&[true, false]));
        let request = FakeRequest::get("http://localhost/some-api");
        let mut response = RecordingRedirector::default();
        let mut context = RequestContext::new();

        assert!(gate.admit(&request, &mut response, &mut context).unwrap());
        assert!(!gate.admit(&request, &mut response, &mut context).unwrap());
        assert_eq!(gate.authenticator().calls(), 2);
    }

    #[test]
    fn verdicts_map_to_decisions() {
        let gate = RequestGate::new(ScriptedAuthenticator::returning(&[true, false]));
        let request = FakeRequest::get("http://localhost/some-api");
        let mut response = RecordingRedirector::default();
        let mut context = RequestContext::new();

        assert_eq!(
            gate.evaluate(&request, &mut response, &mut context).unwrap(),
            Decision::Authenticated
        );
        assert_eq!(
            gate.evaluate(&request, &mut response, &mut context).unwrap(),
            Decision::Redirected
        );
    }

    #[test]
    fn absent_method_and_url_are_not_bypassed() {
        let gate = RequestGate::new(ScriptedAuthenticator::returning(&[true]));
        let request = FakeRequest::default();
        let mut response = RecordingRedirector::default();
        let mut context = RequestContext::new();

        assert!(!RequestGate::<ScriptedAuthenticator>::bypasses(&request));
        assert!(gate.admit(&request, &mut response, &mut context).unwrap());
        assert_eq!(gate.authenticator().calls(), 1);
    }

    #[test]
    fn gate_with_session_authenticator() {
        use crate::auth::{SessionAuthenticator, UserDirectory, UserInfo};
        use std::sync::Arc;

        struct NoUsers;
        impl UserDirectory for NoUsers {
            fn query_by_username(&self, _username: &str) -> Result<Option<UserInfo>> {
                Ok(None)
            }
        }

        let gate = RequestGate::new(SessionAuthenticator::new(Arc::new(NoUsers)));
        let request = FakeRequest::get("http://localhost/topic/list.query").with_username("mars");
        let mut response = RecordingRedirector::default();
        let mut context = RequestContext::new();

        assert!(!gate.admit(&request, &mut response, &mut context).unwrap());
        assert_eq!(
            response.redirects,
            vec!["/#/login?redirect=http://localhost/topic/list.query".to_string()]
        );
    }
}
