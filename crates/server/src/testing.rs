//! In-memory fakes shared by the server tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use triviabot_agent::nlu::{EntitySet, NluClient, NluError};
use triviabot_core::{FactError, FactLookup, ReplyTarget, TriviaRequest};
use triviabot_slack::api::{MessengerError, ResponseMessage, SlackMessenger};
use triviabot_slack::blocks::MessageTemplate;

#[derive(Default)]
pub struct StubFacts {
    pub fail: bool,
    pub paths: Mutex<Vec<String>>,
}

impl StubFacts {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().expect("paths lock").clone()
    }
}

#[async_trait]
impl FactLookup for StubFacts {
    async fn lookup(&self, request: &TriviaRequest) -> Result<String, FactError> {
        self.paths.lock().expect("paths lock").push(request.path());
        if self.fail {
            Err(FactError::Status(500))
        } else {
            Ok(format!("fact for {}", request.path()))
        }
    }
}

#[derive(Default)]
pub struct ScriptedNlu {
    replies: Mutex<VecDeque<EntitySet>>,
}

impl ScriptedNlu {
    pub fn with_script(replies: Vec<EntitySet>) -> Self {
        Self { replies: Mutex::new(replies.into()) }
    }
}

#[async_trait]
impl NluClient for ScriptedNlu {
    async fn extract(&self, _text: &str) -> Result<EntitySet, NluError> {
        Ok(self.replies.lock().expect("script lock").pop_front().unwrap_or_default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Post(ReplyTarget, String),
    Respond(String, String),
    Reaction(String, String),
    Webhook(String, String),
}

#[derive(Default)]
pub struct RecordingMessenger {
    failing_webhooks: Vec<String>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    /// Messenger whose webhook sends to any of `urls` fail.
    pub fn failing_on(urls: &[&str]) -> Self {
        Self {
            failing_webhooks: urls.iter().map(|url| (*url).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent lock").clone()
    }

    /// Polls until at least `count` calls were recorded or a second passed.
    pub async fn wait_for(&self, count: usize) -> Vec<Sent> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().expect("sent lock").push(sent);
    }
}

#[async_trait]
impl SlackMessenger for RecordingMessenger {
    async fn post_message(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
    ) -> Result<(), MessengerError> {
        self.record(Sent::Post(target.clone(), message.fallback_text.clone()));
        Ok(())
    }

    async fn respond(
        &self,
        response_url: &str,
        response: &ResponseMessage,
    ) -> Result<(), MessengerError> {
        self.record(Sent::Respond(response_url.to_owned(), response.message.fallback_text.clone()));
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        _message_ts: &str,
        name: &str,
    ) -> Result<(), MessengerError> {
        self.record(Sent::Reaction(channel_id.to_owned(), name.to_owned()));
        Ok(())
    }

    async fn send_webhook(
        &self,
        webhook_url: &str,
        message: &MessageTemplate,
    ) -> Result<(), MessengerError> {
        if self.failing_webhooks.iter().any(|url| url == webhook_url) {
            return Err(MessengerError::Status(500));
        }
        self.record(Sent::Webhook(webhook_url.to_owned(), message.fallback_text.clone()));
        Ok(())
    }
}
