use crate::{
    auth::{FileUserStore, SessionStore},
    dashboard::{self, DashboardConfig},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub context_path: String,
    pub allowed_origin: Option<String>,
    pub users_file: String,
    pub users_reload_seconds: u64,
    pub session_ttl_seconds: u64,
    pub login_required: bool,
    pub cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the users file cannot be loaded or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let users = Arc::new(
        FileUserStore::load(&args.users_file)
            .with_context(|| format!("Could not load users from {}", args.users_file))?,
    );

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        args.session_ttl_seconds,
    )));

    let config = DashboardConfig::new(args.context_path)
        .with_login_required(args.login_required)
        .with_cookie_secure(args.cookie_secure)
        .with_allowed_origin(args.allowed_origin)
        .with_users_reload_seconds(args.users_reload_seconds);

    dashboard::new(args.port, config, users, sessions).await
}
