//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{self, auth};
use crate::dashboard::normalize_context_path;
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or out of range.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);

    let context_path = normalize_context_path(
        matches
            .get_one::<String>(commands::ARG_CONTEXT_PATH)
            .map_or("", String::as_str),
    );

    let allowed_origin = matches
        .get_one::<String>(commands::ARG_ALLOWED_ORIGIN)
        .cloned()
        .filter(|origin| !origin.trim().is_empty());

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        context_path,
        allowed_origin,
        users_file: auth_opts.users_file,
        users_reload_seconds: auth_opts.users_reload_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        login_required: auth_opts.login_required,
        cookie_secure: auth_opts.cookie_secure,
    }))
}
