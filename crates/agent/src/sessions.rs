use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;
use triviabot_core::{ConversationContext, ReplyTarget};

#[derive(Debug)]
pub struct Session {
    id: u64,
    pub user_id: String,
    pub context: ConversationContext,
    pub reply_target: ReplyTarget,
    closed: bool,
}

impl Session {
    /// A closed session was completed or evicted and is no longer in the store.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

struct SessionEntry {
    id: u64,
    session: SessionHandle,
    last_activity: Instant,
}

/// Open conversations keyed by user id, at most one per user.
///
/// Each session has its own lock; callers hold it for a whole turn so turns
/// from the same user are applied one after another.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    next_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, user_id: &str, reply_target: ReplyTarget) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(user_id) {
            entry.last_activity = Instant::now();
            return Arc::clone(&entry.session);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Mutex::new(Session {
            id,
            user_id: user_id.to_owned(),
            context: ConversationContext::default(),
            reply_target,
            closed: false,
        }));
        sessions.insert(
            user_id.to_owned(),
            SessionEntry { id, session: Arc::clone(&session), last_activity: Instant::now() },
        );
        debug!(event_name = "agent.sessions.created", user_id, "conversation session created");
        session
    }

    pub async fn update(&self, session: &mut Session, context: ConversationContext) {
        session.context = context;
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(&session.user_id) {
            if entry.id == session.id {
                entry.last_activity = Instant::now();
            }
        }
    }

    pub async fn complete(&self, session: &mut Session) {
        session.closed = true;
        let mut sessions = self.sessions.write().await;
        let owned = sessions.get(&session.user_id).is_some_and(|entry| entry.id == session.id);
        if owned {
            sessions.remove(&session.user_id);
            debug!(
                event_name = "agent.sessions.completed",
                user_id = %session.user_id,
                "conversation session completed"
            );
        }
    }

    /// Drops sessions idle for at least `idle_timeout`. Sessions locked by an
    /// in-flight turn are kept.
    pub async fn evict_idle(&self, now: Instant, idle_timeout: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|user_id, entry| {
            if now.saturating_duration_since(entry.last_activity) < idle_timeout {
                return true;
            }
            match entry.session.try_lock() {
                Ok(mut session) => {
                    session.closed = true;
                    debug!(
                        event_name = "agent.sessions.evicted",
                        user_id = %user_id,
                        "idle session evicted"
                    );
                    false
                }
                Err(_) => true,
            }
        });
        before - sessions.len()
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
