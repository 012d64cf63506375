//! In-memory admin sessions.
//!
//! Sessions live only in process memory: a restart logs every admin out.
//! Expired entries are dropped lazily on lookup and eagerly by a periodic
//! sweeper task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::apikey::{TOKEN_BYTES, random_hex};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Lifetime of an admin session.
pub const SESSION_TTL: Duration = Duration::hours(8);

/// How often the background sweeper runs.
pub const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(15 * 60);

/// An issued admin session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token (64 hex chars).
    pub token: String,
    /// The session is valid strictly before this instant.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token to expiry map, safe for concurrent use.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Creates a store with the default TTL on the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SESSION_TTL, Arc::new(SystemClock))
    }

    /// Creates a store with a custom TTL and time source.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Issues a new session token.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source fails.
    pub fn create(&self) -> Result<Session> {
        let token = random_hex(TOKEN_BYTES)?;
        let expires_at = self.clock.now() + self.ttl;
        self.sessions.lock().insert(token.clone(), expires_at);
        debug!(%expires_at, "session created");
        Ok(Session { token, expires_at })
    }

    /// Returns true if `token` names a live session. Expired entries are removed.
    #[must_use]
    pub fn validate(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        match sessions.get(token) {
            Some(expires_at) if now < *expires_at => true,
            Some(_) => {
                sessions.remove(token);
                debug!("expired session removed on lookup");
                false
            }
            None => false,
        }
    }

    /// Removes a session. Unknown tokens are ignored.
    pub fn revoke(&self, token: &str) {
        self.sessions.lock().remove(token);
    }

    /// Removes every expired session and returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, expires_at| now < *expires_at);
        before - sessions.len()
    }

    /// Number of stored sessions, including ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns true if no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Starts a background task that sweeps expired sessions every `interval`.
    ///
    /// The task holds only a weak reference, so it also ends once the store is
    /// dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: StdDuration) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let store = Arc::downgrade(self);
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else { break };
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            info!(removed, remaining = store.len(), "swept expired sessions");
                        }
                    }
                }
            }
            debug!("session sweeper stopped");
        });

        SweeperHandle {
            cancel,
            task: Some(task),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running session sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stops the sweeper and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Returns true once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
