use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_USERS_FILE: &str = "users-file";
pub const ARG_USERS_RELOAD_SECONDS: &str = "users-reload-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_LOGIN_REQUIRED: &str = "login-required";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

#[derive(Debug, Clone)]
pub struct Options {
    pub users_file: String,
    pub users_reload_seconds: u64,
    pub session_ttl_seconds: u64,
    pub login_required: bool,
    pub cookie_secure: bool,
}

impl Options {
    /// Parse login/session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the users file is missing or an interval is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let users_file = matches
            .get_one::<String>(ARG_USERS_FILE)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_USERS_FILE}"))?;

        let positive = |id: &str| -> Result<u64> {
            match matches.get_one::<u64>(id).copied() {
                Some(0) => Err(anyhow!("--{id} must be greater than zero")),
                Some(value) => Ok(value),
                None => Err(anyhow!("missing required argument: --{id}")),
            }
        };

        Ok(Self {
            users_file,
            users_reload_seconds: positive(ARG_USERS_RELOAD_SECONDS)?,
            session_ttl_seconds: positive(ARG_SESSION_TTL_SECONDS)?,
            login_required: matches
                .get_one::<bool>(ARG_LOGIN_REQUIRED)
                .copied()
                .unwrap_or(true),
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USERS_FILE)
                .long(ARG_USERS_FILE)
                .help("Path to the users file (username=password[,1 for admin] per line)")
                .env("DASHGATE_USERS_FILE")
                .required(true),
        )
        .arg(
            Arg::new(ARG_USERS_RELOAD_SECONDS)
                .long(ARG_USERS_RELOAD_SECONDS)
                .help("How often to check the users file for changes")
                .env("DASHGATE_USERS_RELOAD_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Idle session lifetime in seconds")
                .env("DASHGATE_SESSION_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_LOGIN_REQUIRED)
                .long(ARG_LOGIN_REQUIRED)
                .help("Require a dashboard login before serving protected routes")
                .env("DASHGATE_LOGIN_REQUIRED")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (dashboard served over HTTPS)")
                .env("DASHGATE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
