//! In-memory session store.
//!
//! Sessions are keyed by ULID, expire after an idle TTL, and carry string
//! attributes. The decision core only reads sessions through
//! [`SessionProvider`]; the login endpoints create and destroy them.

use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{task::JoinHandle, time::interval};
use tracing::debug;
use ulid::Ulid;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 30 * 60;

/// Access to the session attached to the current request.
pub trait SessionProvider {
    /// Return the request's session. When `create` is false an absent session
    /// stays absent.
    fn session(&self, create: bool) -> Option<Session>;
}

/// Snapshot of a session's attributes, taken when the session was fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    id: String,
    attributes: HashMap<String, String>,
}

impl Session {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[derive(Debug)]
struct SessionRecord {
    attributes: HashMap<String, String>,
    last_access: Instant,
}

impl SessionRecord {
    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.last_access) >= ttl
    }
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS))
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a new, empty session.
    #[must_use]
    pub fn create(&self) -> Session {
        let id = Ulid::new().to_string();
        self.sessions.write().insert(
            id.clone(),
            SessionRecord {
                attributes: HashMap::new(),
                last_access: Instant::now(),
            },
        );
        debug!("session created");
        Session::new(id)
    }

    /// Fetch a live session and refresh its idle timer. Expired sessions are
    /// evicted and reported absent.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = Instant::now();
        let mut sessions = self.sessions.write();

        let expired = sessions.get(id)?.expired(now, self.ttl);
        if expired {
            sessions.remove(id);
            debug!("session expired");
            return None;
        }

        let record = sessions.get_mut(id)?;
        record.last_access = now;
        Some(Session {
            id: id.to_string(),
            attributes: record.attributes.clone(),
        })
    }

    /// Returns false when the session does not exist.
    pub fn set_attribute(&self, id: &str, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.sessions.write().get_mut(id).map_or(false, |record| {
            record.attributes.insert(key.into(), value.into());
            true
        })
    }

    pub fn remove_attribute(&self, id: &str, key: &str) -> Option<String> {
        self.sessions.write().get_mut(id)?.attributes.remove(key)
    }

    /// Returns true when a session was removed.
    pub fn invalidate(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Drop every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, record| !record.expired(now, self.ttl));
        before - sessions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Purge expired sessions every `every`.
    pub fn spawn_purge(store: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let mut purge_interval = interval(every);

        tokio::spawn(async move {
            loop {
                purge_interval.tick().await;

                let purged = store.purge_expired();
                if purged > 0 {
                    debug!("purged {} expired sessions", purged);
                }
            }
        })
    }
}
