//! Session authenticator: allow requests whose session names a known user,
//! redirect everything else to the login page.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    context::RequestContext,
    request::{login_redirect_target, AuthRequest, Redirector},
    users::UserDirectory,
    Decision, USER_NAME,
};

/// Allow/deny step the [`RequestGate`](super::RequestGate) delegates to.
pub trait Authenticate: Send + Sync {
    /// Returns true when the request may proceed. A false verdict has already
    /// written its response through `response`.
    ///
    /// # Errors
    /// Propagates faults of the collaborators (user directory, redirect sink).
    fn authenticate<R, W>(
        &self,
        request: &R,
        response: &mut W,
        context: &mut RequestContext,
    ) -> Result<bool>
    where
        R: AuthRequest + ?Sized,
        W: Redirector + ?Sized;
}

#[derive(Clone)]
pub struct SessionAuthenticator {
    directory: Arc<dyn UserDirectory>,
}

impl SessionAuthenticator {
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Evaluate the request, returning the terminal decision.
    ///
    /// # Errors
    /// Propagates directory lookup and redirect failures unchanged.
    #[instrument(skip_all)]
    pub fn decide<R, W>(
        &self,
        request: &R,
        response: &mut W,
        context: &mut RequestContext,
    ) -> Result<Decision>
    where
        R: AuthRequest + ?Sized,
        W: Redirector + ?Sized,
    {
        let username = request
            .session(false)
            .and_then(|session| session.attribute(USER_NAME).map(str::to_string));

        let Some(username) = username else {
            debug!("no session or no username attribute");
            return redirect_to_login(request, response);
        };

        match self.directory.query_by_username(&username)? {
            Some(user) => {
                debug!("session user {} resolved", username);
                context.put(USER_NAME, user);
                Ok(Decision::Authenticated)
            }
            None => {
                debug!("session user {} not in directory", username);
                redirect_to_login(request, response)
            }
        }
    }
}

impl Authenticate for SessionAuthenticator {
    fn authenticate<R, W>(
        &self,
        request: &R,
        response: &mut W,
        context: &mut RequestContext,
    ) -> Result<bool>
    where
        R: AuthRequest + ?Sized,
        W: Redirector + ?Sized,
    {
        self.decide(request, response, context)
            .map(Decision::is_allowed)
    }
}

fn redirect_to_login<R, W>(request: &R, response: &mut W) -> Result<Decision>
where
    R: AuthRequest + ?Sized,
    W: Redirector + ?Sized,
{
    let target = login_redirect_target(request);
    info!("redirecting to {}", target);
    response.send_redirect(&target)?;
    Ok(Decision::Redirected)
}
