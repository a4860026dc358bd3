//! # Dashgate (session gate for the broker administration dashboard)
//!
//! `dashgate` sits in front of the dashboard's business handlers and decides,
//! per request, whether the request may proceed.
//!
//! ## Decision flow
//!
//! Every request first meets the [`auth::RequestGate`]. `OPTIONS` requests and
//! requests for the CSRF token endpoint bypass authentication. Everything else
//! is handed to the [`auth::SessionAuthenticator`], which reads the username
//! from the caller's session and looks it up in the user directory. A hit
//! resolves the user into a per-request [`auth::RequestContext`]; a miss
//! redirects the browser to `/#/login?redirect=<original URL>`.
//!
//! ## State
//!
//! The decision core holds no state of its own. Sessions live in an in-memory
//! [`auth::SessionStore`] and users come from a flat `users.properties` file
//! loaded by [`auth::FileUserStore`].

pub mod auth;
pub mod cli;
pub mod dashboard;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
