//! User directory backed by a `users.properties` file.
//!
//! One `username=password[,flag]` entry per line, `flag` `1` marking an
//! administrator. Blank lines and `#`/`!` comments are ignored.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};
use tokio::{
    task::JoinHandle,
    time::{interval, Duration},
};
use tracing::{debug, error, info, instrument, warn};

/// Lookup capability consulted by the authenticator.
///
/// Errors are faults of the directory itself; an unknown user is `Ok(None)`.
pub trait UserDirectory: Send + Sync {
    /// # Errors
    /// Returns an error if the directory cannot be queried.
    fn query_by_username(&self, username: &str) -> Result<Option<UserInfo>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Ordinary,
}

impl UserRole {
    fn from_flag(flag: &str) -> Self {
        if flag.trim() == "1" {
            Self::Admin
        } else {
            Self::Ordinary
        }
    }
}

#[derive(Clone)]
pub struct UserInfo {
    username: String,
    password: SecretString,
    role: UserRole,
}

impl UserInfo {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: UserRole) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            role,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub const fn role(&self) -> UserRole {
        self.role
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    #[must_use]
    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password.expose_secret() == candidate
    }
}

impl std::fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInfo")
            .field("username", &self.username)
            .field("password", &"***")
            .field("role", &self.role)
            .finish()
    }
}

static USER_ENTRY: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^([^=:\s]+)\s*[=:]\s*(.*)$"));

/// Parse the contents of a users file.
///
/// # Errors
/// Returns an error if the entry pattern is unusable.
pub fn parse_users(contents: &str) -> Result<HashMap<String, UserInfo>> {
    let entry = USER_ENTRY
        .as_ref()
        .map_err(|e| anyhow!("invalid users entry pattern: {e}"))?;
    let mut users = HashMap::new();

    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let Some(caps) = entry.captures(line) else {
            warn!("users file line {}: expected username=password", index + 1);
            continue;
        };

        let username = caps[1].trim();
        let mut value = caps[2].splitn(2, ',');
        let password = value.next().unwrap_or_default().trim();
        let role = value.next().map_or(UserRole::Ordinary, UserRole::from_flag);

        if password.is_empty() {
            warn!("users file line {}: empty password for {}", index + 1, username);
            continue;
        }

        users.insert(username.to_string(), UserInfo::new(username, password, role));
    }

    Ok(users)
}

/// [`UserDirectory`] that reads a users file and can reload it on change.
pub struct FileUserStore {
    path: PathBuf,
    users: RwLock<HashMap<String, UserInfo>>,
    modified: Mutex<Option<SystemTime>>,
}

impl FileUserStore {
    /// Load users from `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (users, modified) = read_users(&path)?;

        info!("Loaded {} users from {}", users.len(), path.display());

        Ok(Self {
            path,
            users: RwLock::new(users),
            modified: Mutex::new(modified),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Re-read the file, replacing the whole table. Returns the new user count.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read; the previous table is kept.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn reload(&self) -> Result<usize> {
        let (users, modified) = read_users(&self.path)?;
        let count = users.len();
        *self.users.write() = users;
        *self.modified.lock() = modified;
        Ok(count)
    }

    /// Reload only when the file's modification time moved.
    ///
    /// # Errors
    /// Returns an error if the file metadata or contents cannot be read.
    pub fn reload_if_changed(&self) -> Result<Option<usize>> {
        let current = modified_time(&self.path)?;
        if current.is_some() && current == *self.modified.lock() {
            return Ok(None);
        }
        self.reload().map(Some)
    }

    /// Check the credentials submitted on the login form.
    #[must_use]
    pub fn verify_credentials(&self, username: &str, password: &str) -> Option<UserInfo> {
        self.users
            .read()
            .get(username)
            .filter(|user| user.password_matches(password))
            .cloned()
    }

    /// Poll the file every `every` and reload it when it changes.
    pub fn spawn_reload(store: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let mut reload_interval = interval(every);

        tokio::spawn(async move {
            loop {
                reload_interval.tick().await;

                match store.reload_if_changed() {
                    Ok(Some(count)) => info!("Reloaded {} users from {}", count, store.path.display()),
                    Ok(None) => debug!("users file unchanged"),
                    Err(e) => error!("Error reloading users file: {:#}", e),
                }
            }
        })
    }
}

impl UserDirectory for FileUserStore {
    fn query_by_username(&self, username: &str) -> Result<Option<UserInfo>> {
        Ok(self.users.read().get(username).cloned())
    }
}

// The mtime is taken before the contents: a write landing in between leaves
// a stale mtime, so the next poll reloads instead of skipping the change.
fn read_users(path: &Path) -> Result<(HashMap<String, UserInfo>, Option<SystemTime>)> {
    let modified = modified_time(path)?;
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read users file: {}", path.display()))?;
    Ok((parse_users(&contents)?, modified))
}

fn modified_time(path: &Path) -> Result<Option<SystemTime>> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to stat users file: {}", path.display()))?;
    Ok(metadata.modified().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn temp_users_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("dashgate-users-{}.properties", Ulid::new()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parse_users_reads_roles_and_skips_comments() {
        let users = parse_users(
            "# This file supports hot change\n\
             ! legacy comment\n\
             \n\
             admin=admin,1\n\
             mars = red-planet\n\
             venus:morning,0\n",
        )
        .unwrap();

        assert_eq!(users.len(), 3);
        assert!(users["admin"].is_admin());
        assert!(users["admin"].password_matches("admin"));
        assert_eq!(users["mars"].role(), UserRole::Ordinary);
        assert!(users["mars"].password_matches("red-planet"));
        assert!(users["venus"].password_matches("morning"));
        assert!(!users["venus"].is_admin());
    }

    #[test]
    fn parse_users_skips_incomplete_entries() {
        let users = parse_users("lonely\nempty=\nok=pw\n").unwrap();
        assert_eq!(users.len(), 1);
        assert!(users.contains_key("ok"));
    }

    #[test]
    fn debug_hides_password() {
        let user = UserInfo::new("mars", "red-planet", UserRole::Ordinary);
        let printed = format!("{user:?}");
        assert!(printed.contains("mars"));
        assert!(!printed.contains("red-planet"));
    }

    #[test]
    fn load_and_query() {
        let path = temp_users_file("admin=admin,1\nmars=red\n");
        let store = FileUserStore::load(&path).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.query_by_username("mars").unwrap().is_some());
        assert!(store.query_by_username("pluto").unwrap().is_none());
        assert!(store.verify_credentials("mars", "red").is_some());
        assert!(store.verify_credentials("mars", "blue").is_none());
        assert!(store.verify_credentials("pluto", "red").is_none());

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn load_missing_file_fails() {
        let path = std::env::temp_dir().join(format!("dashgate-missing-{}", Ulid::new()));
        let err = FileUserStore::load(&path).err().unwrap();
        assert!(err.to_string().contains("Failed to read users file"));
    }

    #[test]
    fn reload_replaces_table() {
        let path = temp_users_file("mars=red\n");
        let store = FileUserStore::load(&path).unwrap();

        fs::write(&path, "venus=morning\njupiter=giant,1\n").unwrap();
        assert_eq!(store.reload().unwrap(), 2);
        assert!(store.query_by_username("mars").unwrap().is_none());
        assert!(store.query_by_username("jupiter").unwrap().unwrap().is_admin());

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn reload_if_changed_follows_mtime() {
        let path = temp_users_file("mars=red\n");
        let store = FileUserStore::load(&path).unwrap();
        assert_eq!(store.reload_if_changed().unwrap(), None);

        fs::write(&path, "venus=morning\n").unwrap();
        let bumped = SystemTime::now() + Duration::from_secs(10);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(bumped)
            .unwrap();

        assert_eq!(store.reload_if_changed().unwrap(), Some(1));
        assert!(store.query_by_username("venus").unwrap().is_some());
        assert!(store.query_by_username("mars").unwrap().is_none());
        assert_eq!(store.reload_if_changed().unwrap(), None);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn stale_mtime_forces_reload() {
        let path = temp_users_file("mars=red\n");
        let store = FileUserStore::load(&path).unwrap();

        // Recorded mtime older than the file, as after a write racing a read.
        *store.modified.lock() = Some(SystemTime::UNIX_EPOCH);
        fs::write(&path, "venus=morning\n").unwrap();

        assert_eq!(store.reload_if_changed().unwrap(), Some(1));
        assert!(store.query_by_username("venus").unwrap().is_some());

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn reload_failure_keeps_previous_table() {
        let path = temp_users_file("mars=red\n");
        let store = FileUserStore::load(&path).unwrap();

        fs::remove_file(&path).unwrap();
        assert!(store.reload().is_err());
        assert!(store.query_by_username("mars").unwrap().is_some());
    }
}
