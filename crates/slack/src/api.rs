use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use triviabot_core::ReplyTarget;

use crate::blocks::MessageTemplate;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessengerError {
    #[error("slack request failed: {0}")]
    Transport(String),
    #[error("slack answered with status {0}")]
    Status(u16),
    #[error("slack api error: {0}")]
    Api(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Ephemeral,
    InChannel,
}

/// Body posted to an interaction or slash command `response_url`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseMessage {
    pub message: MessageTemplate,
    pub response_type: ResponseType,
    pub replace_original: bool,
}

impl ResponseMessage {
    pub fn new(message: MessageTemplate, response_type: ResponseType) -> Self {
        Self { message, response_type, replace_original: false }
    }

    pub fn replacing(message: MessageTemplate, response_type: ResponseType) -> Self {
        Self { replace_original: true, ..Self::new(message, response_type) }
    }

    /// Slack JSON body; `replace_original` is only sent when set.
    pub fn to_json(&self) -> Value {
        let mut body = message_json(&self.message);
        body["response_type"] = json!(self.response_type);
        if self.replace_original {
            body["replace_original"] = json!(true);
        }
        body
    }
}

/// Outbound Slack operations used by the event handlers.
#[async_trait]
pub trait SlackMessenger: Send + Sync {
    async fn post_message(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
    ) -> Result<(), MessengerError>;

    async fn respond(
        &self,
        response_url: &str,
        response: &ResponseMessage,
    ) -> Result<(), MessengerError>;

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_ts: &str,
        name: &str,
    ) -> Result<(), MessengerError>;

    async fn send_webhook(
        &self,
        webhook_url: &str,
        message: &MessageTemplate,
    ) -> Result<(), MessengerError>;
}

#[derive(Debug, Deserialize)]
struct WebApiReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// [`SlackMessenger`] over the Slack Web API, response URLs and incoming
/// webhooks.
pub struct WebApiMessenger {
    client: Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl WebApiMessenger {
    pub fn new(
        api_base_url: impl Into<String>,
        bot_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, MessengerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| MessengerError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            bot_token,
        })
    }

    /// Bot user id of the token, via `auth.test`.
    pub async fn auth_test(&self) -> Result<String, MessengerError> {
        let reply = self.call("auth.test", json!({})).await?;
        reply
            .user_id
            .ok_or_else(|| MessengerError::Api("auth.test returned no user_id".to_owned()))
    }

    async fn call(&self, method: &str, body: Value) -> Result<WebApiReply, MessengerError> {
        let url = format!("{}/{method}", self.api_base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MessengerError::Status(status.as_u16()));
        }

        let reply: WebApiReply = response.json().await.map_err(transport_error)?;
        if reply.ok {
            debug!(event_name = "slack.api.call_succeeded", method, "slack api call succeeded");
            Ok(reply)
        } else {
            Err(MessengerError::Api(reply.error.unwrap_or_else(|| "unknown_error".to_owned())))
        }
    }

    async fn post_url(&self, url: &str, body: Value) -> Result<(), MessengerError> {
        let response = self.client.post(url).json(&body).send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(MessengerError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl SlackMessenger for WebApiMessenger {
    async fn post_message(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
    ) -> Result<(), MessengerError> {
        let mut body = message_json(message);
        body["channel"] = json!(target.channel_id);
        if let Some(thread_ts) = &target.thread_ts {
            body["thread_ts"] = json!(thread_ts);
        }
        self.call("chat.postMessage", body).await.map(|_| ())
    }

    async fn respond(
        &self,
        response_url: &str,
        response: &ResponseMessage,
    ) -> Result<(), MessengerError> {
        self.post_url(response_url, response.to_json()).await
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_ts: &str,
        name: &str,
    ) -> Result<(), MessengerError> {
        let body = json!({ "channel": channel_id, "timestamp": message_ts, "name": name });
        match self.call("reactions.add", body).await {
            Ok(_) => Ok(()),
            Err(MessengerError::Api(code)) if code == "already_reacted" => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn send_webhook(
        &self,
        webhook_url: &str,
        message: &MessageTemplate,
    ) -> Result<(), MessengerError> {
        self.post_url(webhook_url, message_json(message)).await
    }
}

fn message_json(message: &MessageTemplate) -> Value {
    let mut body = json!({ "text": message.fallback_text });
    if !message.blocks.is_empty() {
        body["blocks"] = json!(message.blocks);
    }
    body
}

fn transport_error(error: reqwest::Error) -> MessengerError {
    MessengerError::Transport(error.to_string())
}
