use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use triviabot_core::{Category, ReplyTarget};

use crate::{
    nlu::NluClient,
    reply::Responder,
    resolver::IntentResolver,
    sessions::{Session, SessionStore},
};

pub const ASK_FOR_NUMBER_MESSAGE: &str = "Which number do you want trivia about?";
pub const NLU_UNAVAILABLE_MESSAGE: &str =
    "Sorry, I couldn't reach my language service. Can you try again in a moment?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered { response: String },
    AwaitingSubject { category: Category },
    NluUnavailable,
}

pub struct AgentRuntime {
    sessions: Arc<SessionStore>,
    nlu: Arc<dyn NluClient>,
    resolver: IntentResolver,
    responder: Arc<dyn Responder>,
}

impl AgentRuntime {
    pub fn new(
        sessions: Arc<SessionStore>,
        nlu: Arc<dyn NluClient>,
        resolver: IntentResolver,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self { sessions, nlu, resolver, responder }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Runs one conversation turn for `user_id`. The session lock is held for
    /// the whole turn.
    pub async fn handle_turn(
        &self,
        user_id: &str,
        reply_target: ReplyTarget,
        text: &str,
    ) -> TurnOutcome {
        let mut session = self.open_session(user_id, reply_target).await;

        let entities = match self.nlu.extract(text).await {
            Ok(entities) => entities,
            Err(error) => {
                warn!(
                    event_name = "agent.runtime.nlu_failed",
                    user_id,
                    error = %error,
                    "nlu extraction failed; session kept for retry"
                );
                self.send(&session, NLU_UNAVAILABLE_MESSAGE).await;
                return TurnOutcome::NluUnavailable;
            }
        };

        let context = self.resolver.resolve(&session.context, &entities).await;

        let outcome = match &context.response {
            Some(response) => {
                self.send(&session, response).await;
                TurnOutcome::Answered { response: response.clone() }
            }
            None => {
                self.send(&session, ASK_FOR_NUMBER_MESSAGE).await;
                TurnOutcome::AwaitingSubject { category: context.category.unwrap_or_default() }
            }
        };

        if context.done {
            self.sessions.complete(&mut session).await;
        } else {
            self.sessions.update(&mut session, context).await;
        }

        info!(
            event_name = "agent.runtime.turn_completed",
            user_id,
            outcome = ?outcome,
            "conversation turn completed"
        );
        outcome
    }

    async fn open_session(
        &self,
        user_id: &str,
        reply_target: ReplyTarget,
    ) -> OwnedMutexGuard<Session> {
        loop {
            let handle = self.sessions.get_or_create(user_id, reply_target.clone()).await;
            let session = handle.lock_owned().await;
            if !session.is_closed() {
                return session;
            }
        }
    }

    async fn send(&self, session: &Session, text: &str) {
        if let Err(error) = self.responder.send(&session.reply_target, text).await {
            warn!(
                event_name = "agent.runtime.reply_failed",
                user_id = %session.user_id,
                channel_id = %session.reply_target.channel_id,
                error = %error,
                "failed to deliver conversation reply"
            );
        }
    }
}
