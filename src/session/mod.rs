//! Named, reusable browser sessions.
//!
//! The pool maps session ids to live browser drivers so consecutive
//! operations (and consecutive tool calls in a chain) can share cookies,
//! login state and page context. Sessions are swept after five idle
//! minutes; all mutation goes through the pool lock, and each session's
//! resource sits behind its own lock so concurrent operations on the same
//! session are serialized, never interleaved.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::browser::BrowserDriver;
use crate::utils::constants::{SESSION_IDLE_TTL, SESSION_SWEEP_INTERVAL};

/// Anything the pool can hold and tear down on eviction.
#[async_trait]
pub trait SessionResource: Send + Sync + 'static {
    async fn teardown(&mut self);
}

#[async_trait]
impl SessionResource for BrowserDriver {
    async fn teardown(&mut self) {
        self.close().await;
    }
}

struct SessionEntry<R> {
    resource: Arc<Mutex<R>>,
    created_at: DateTime<Utc>,
    last_used: Instant,
    metadata: Map<String, Value>,
}

/// Snapshot of one live session, without its resource handle.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
    pub metadata: Map<String, Value>,
}

/// Pool of named sessions with idle expiry.
pub struct SessionPool<R: SessionResource> {
    sessions: Mutex<HashMap<String, SessionEntry<R>>>,
    idle_ttl: Duration,
    sweep_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

/// The pool as used by the crawl orchestrator.
pub type BrowserSessionPool = SessionPool<BrowserDriver>;

impl<R: SessionResource> SessionPool<R> {
    #[must_use]
    pub fn new(idle_ttl: Duration, sweep_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
            sweep_interval,
            sweeper: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn with_defaults() -> Arc<Self> {
        Self::new(SESSION_IDLE_TTL, SESSION_SWEEP_INTERVAL)
    }

    /// Store a resource under `id` (generated when absent) and return the id.
    ///
    /// Starts the idle sweeper on first use.
    pub async fn create(self: &Arc<Self>, id: Option<String>, resource: R) -> String {
        let id = id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        {
            let mut sessions = self.sessions.lock().await;
            if let Some(previous) = sessions.insert(
                id.clone(),
                SessionEntry {
                    resource: Arc::new(Mutex::new(resource)),
                    created_at: Utc::now(),
                    last_used: Instant::now(),
                    metadata: Map::new(),
                },
            ) {
                // Replacing an id tears down the old resource off-lock.
                tokio::spawn(async move {
                    previous.resource.lock().await.teardown().await;
                });
            }
        }
        info!(session_id = %id, "session created");

        self.ensure_sweeper().await;
        id
    }

    /// Fetch a live session, bumping its idle clock.
    ///
    /// Returns `None` for unknown or already-swept ids.
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<R>>> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.last_used = Instant::now();
                debug!(session_id = id, "session retrieved");
                Some(Arc::clone(&entry.resource))
            }
            None => {
                warn!(session_id = id, "session not found");
                None
            }
        }
    }

    /// Shallow-merge a metadata fragment into the session.
    pub async fn update_metadata(&self, id: &str, fragment: Map<String, Value>) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.last_used = Instant::now();
                for (key, value) in fragment {
                    entry.metadata.insert(key, value);
                }
                true
            }
            None => false,
        }
    }

    /// Close one session, tearing down its resource.
    pub async fn close(&self, id: &str) -> bool {
        let removed = { self.sessions.lock().await.remove(id) };
        match removed {
            Some(entry) => {
                entry.resource.lock().await.teardown().await;
                info!(session_id = id, "session closed");
                true
            }
            None => false,
        }
    }

    /// Close every session and stop the sweeper.
    pub async fn close_all(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }

        let drained: Vec<_> = { self.sessions.lock().await.drain().collect() };
        for (id, entry) in drained {
            entry.resource.lock().await.teardown().await;
            debug!(session_id = %id, "session closed during shutdown");
        }
        info!("all sessions closed");
    }

    /// Metadata snapshot of every live session.
    pub async fn active_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.lock().await;
        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .map(|(id, entry)| SessionInfo {
                id: id.clone(),
                created_at: entry.created_at,
                idle_secs: entry.last_used.elapsed().as_secs(),
                metadata: entry.metadata.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Remove and tear down sessions idle past the TTL.
    ///
    /// Expired entries leave the map while the pool lock is held, so `get`
    /// can never hand out a half-closed session; the actual teardown runs
    /// off-lock. Errors here are logged and swallowed; the sweeper must
    /// not die.
    async fn sweep(&self) {
        let expired: Vec<(String, SessionEntry<R>)> = {
            let mut sessions = self.sessions.lock().await;
            let doomed: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| entry.last_used.elapsed() > self.idle_ttl)
                .map(|(id, _)| id.clone())
                .collect();
            doomed
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        if expired.is_empty() {
            return;
        }

        let count = expired.len();
        for (id, entry) in expired {
            entry.resource.lock().await.teardown().await;
            info!(session_id = %id, "closed expired session");
        }
        debug!(count, "idle sweep complete");
    }

    async fn ensure_sweeper(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock().await;
        let running = sweeper.as_ref().map(|h| !h.is_finished()).unwrap_or(false);
        if running {
            return;
        }

        let pool = Arc::downgrade(self);
        let interval = self.sweep_interval;
        *sweeper = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match pool.upgrade() {
                    Some(pool) => {
                        if pool.shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        pool.sweep().await;
                    }
                    None => break,
                }
            }
            debug!("session sweeper exiting");
        }));
    }
}
