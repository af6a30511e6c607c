use crate::db::{Connector, DbSession, PoolLimits};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

pub type SessionId = Uuid;

struct SessionEntry {
    session: Arc<DbSession>,
    last_seen: Instant,
}

/// Owns one [`DbSession`] per browser session.
pub struct SessionRegistry {
    connector: Arc<dyn Connector>,
    limits: PoolLimits,
    idle_ttl: Duration,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>, limits: PoolLimits, idle_ttl: Duration) -> Self {
        Self {
            connector,
            limits,
            idle_ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a live session and mark it as seen. A session idle past the TTL is
    /// logged out and dropped instead, and the caller starts a fresh one.
    pub fn get(&self, id: &SessionId) -> Option<Arc<DbSession>> {
        let now = Instant::now();
        let expired = {
            let mut sessions = self.lock();
            let entry = sessions.get_mut(id)?;
            if now.duration_since(entry.last_seen) <= self.idle_ttl {
                entry.last_seen = now;
                return Some(entry.session.clone());
            }
            sessions.remove(id).map(|e| e.session)
        };
        if let Some(stale) = expired {
            debug!(session = %id, "session expired");
            logout_in_background(vec![stale]);
        }
        None
    }

    /// Log out and drop every session idle past the TTL.
    pub fn sweep(&self) -> usize {
        let evicted = evict_idle(&mut self.lock(), Instant::now(), self.idle_ttl);
        let count = evicted.len();
        if count > 0 {
            info!(count, "evicting idle sessions");
            logout_in_background(evicted);
        }
        count
    }

    /// Start a new session, evicting idle ones first.
    pub fn create(&self) -> (SessionId, Arc<DbSession>) {
        self.sweep();
        let id = Uuid::new_v4();
        let session = Arc::new(DbSession::new(self.connector.clone(), self.limits));
        self.lock().insert(
            id,
            SessionEntry {
                session: session.clone(),
                last_seen: Instant::now(),
            },
        );
        debug!(session = %id, "session created");
        (id, session)
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Log every session out; used on shutdown.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<DbSession>> = self
            .lock()
            .drain()
            .map(|(_, entry)| entry.session)
            .collect();
        info!(count = sessions.len(), "closing all sessions");
        for session in sessions {
            session.logout().await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn logout_in_background(sessions: Vec<Arc<DbSession>>) {
    for stale in sessions {
        tokio::spawn(async move {
            stale.logout().await;
        });
    }
}

/// Remove sessions idle past `ttl` that no request is currently using.
fn evict_idle(
    sessions: &mut HashMap<SessionId, SessionEntry>,
    now: Instant,
    ttl: Duration,
) -> Vec<Arc<DbSession>> {
    let stale: Vec<SessionId> = sessions
        .iter()
        .filter(|(_, e)| {
            now.duration_since(e.last_seen) > ttl && Arc::strong_count(&e.session) == 1
        })
        .map(|(id, _)| *id)
        .collect();
    stale
        .into_iter()
        .filter_map(|id| sessions.remove(&id).map(|e| e.session))
        .collect()
}
