use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use triviabot_agent::{
    reply::{ReplyError, Responder},
    runtime::AgentRuntime,
    sessions::SessionStore,
};
use triviabot_core::ReplyTarget;
use triviabot_slack::{
    api::SlackMessenger,
    blocks::MessageTemplate,
    events::{EventContext, EventHandlerError, MentionEvent, MentionService},
};

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Delivers conversation replies as plain channel messages.
pub struct SlackResponder {
    messenger: Arc<dyn SlackMessenger>,
}

impl SlackResponder {
    pub fn new(messenger: Arc<dyn SlackMessenger>) -> Self {
        Self { messenger }
    }
}

#[async_trait]
impl Responder for SlackResponder {
    async fn send(&self, target: &ReplyTarget, text: &str) -> Result<(), ReplyError> {
        self.messenger
            .post_message(target, &MessageTemplate::text(text))
            .await
            .map_err(|error| ReplyError::Delivery(error.to_string()))
    }
}

/// Runs every mention through the conversation runtime.
pub struct RuntimeMentionService {
    runtime: Arc<AgentRuntime>,
}

impl RuntimeMentionService {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl MentionService for RuntimeMentionService {
    async fn handle_mention(
        &self,
        event: &MentionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let outcome =
            self.runtime.handle_turn(&event.user_id, event.reply_target(), &event.text).await;
        debug!(
            event_name = "system.conversation.mention_handled",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            outcome = ?outcome,
            "mention handled by conversation runtime"
        );
        Ok(())
    }
}

pub fn sweep_interval(idle_timeout: Duration) -> Duration {
    (idle_timeout / 2).clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL)
}

/// Periodically evicts sessions idle for longer than `idle_timeout`.
pub fn spawn_session_sweep(sessions: Arc<SessionStore>, idle_timeout: Duration) -> JoinHandle<()> {
    let period = sweep_interval(idle_timeout);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(Instant::now(), idle_timeout).await;
            if evicted > 0 {
                info!(
                    event_name = "system.conversation.sessions_evicted",
                    correlation_id = "session-sweep",
                    evicted,
                    "idle conversation sessions evicted"
                );
            }
        }
    })
}
