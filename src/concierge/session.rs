//! Chat sessions held by the concierge.

use crate::brain::State;
use crate::brain::provider::Message;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Seller-facing conversation id, assigned before the first model call.
pub const SESSION_ID: &str = "session_id";
/// Whether a seller conversation is in progress.
pub const SESSION_ACTIVE: &str = "session_active";
/// Seller currently being talked to, or `"None"`.
pub const ACTIVE_AGENT: &str = "active_agent";
/// Remote task kept while the seller waits for input.
pub const TASK_ID: &str = "task_id";
/// Metadata that came with the user's latest chat message.
pub const INPUT_MESSAGE_METADATA: &str = "input_message_metadata";

pub const NO_ACTIVE_AGENT: &str = "None";

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub state: State,
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: State::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The seller in charge, when a seller conversation is active.
    pub fn active_agent(&self) -> Option<&str> {
        if !self.state.get_bool(SESSION_ACTIVE) {
            return None;
        }
        self.state
            .get_str(ACTIVE_AGENT)
            .filter(|name| *name != NO_ACTIVE_AGENT)
    }
}

/// Idle time after which a session may be dropped.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// In-memory session table. Each session has its own mutex, held by the
/// runner for a whole turn. Idle sessions are pruned whenever a new one is
/// inserted; sessions with a turn in flight are never dropped.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(
            Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            DEFAULT_MAX_SESSIONS,
        )
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub async fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        self.prune(&mut sessions);
        sessions.insert(id.clone(), Arc::new(Mutex::new(Session::new(id.clone()))));
        tracing::debug!("Created session {}", id);
        id
    }

    /// Look up `id`, creating it (under that id) when unknown. `None` always
    /// creates a fresh session.
    pub async fn get_or_create(&self, id: Option<&str>) -> Arc<Mutex<Session>> {
        let id = match id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        if let Some(session) = self.sessions.read().await.get(&id) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(&id) {
            return session.clone();
        }
        self.prune(&mut sessions);
        let session = Arc::new(Mutex::new(Session::new(id.clone())));
        sessions.insert(id, session.clone());
        session
    }

    /// Drop expired sessions, then the least recently used ones until there is
    /// room for one more. Locked sessions are skipped.
    fn prune(&self, sessions: &mut HashMap<String, Arc<Mutex<Session>>>) {
        let cutoff = Utc::now() - self.idle_ttl;
        let mut idle: Vec<(DateTime<Utc>, String)> = sessions
            .iter()
            .filter_map(|(id, session)| {
                let updated_at = session.try_lock().ok()?.updated_at;
                Some((updated_at, id.clone()))
            })
            .collect();

        let before = sessions.len();
        idle.retain(|(updated_at, id)| {
            if *updated_at < cutoff {
                sessions.remove(id);
                false
            } else {
                true
            }
        });

        idle.sort();
        for (_, id) in idle {
            if sessions.len() < self.max_sessions {
                break;
            }
            sessions.remove(&id);
        }

        let dropped = before - sessions.len();
        if dropped > 0 {
            tracing::debug!("Pruned {} idle sessions", dropped);
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
