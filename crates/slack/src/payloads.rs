//! Slack wire payloads and their mapping onto [`SlackEvent`].

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    commands::{strip_user_mentions, SlashCommandPayload},
    events::{
        AmbientMessageEvent, BlockActionEvent, ChannelJoinedEvent, MentionEvent, SlackEvent,
    },
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed slack payload: {0}")]
    Malformed(String),
}

/// Body of a `POST` from the Events API.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventsApiPayload {
    UrlVerification {
        #[serde(default)]
        token: String,
        challenge: String,
    },
    EventCallback(EventCallback),
    #[serde(other)]
    Unknown,
}

impl EventsApiPayload {
    pub fn parse(body: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(body).map_err(|error| PayloadError::Malformed(error.to_string()))
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::UrlVerification { token, .. } => Some(token),
            Self::EventCallback(callback) => Some(&callback.token),
            Self::Unknown => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventCallback {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub authorizations: Vec<Authorization>,
    pub event: InnerEvent,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Authorization {
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InnerEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: Option<String>,
    pub channel: Option<String>,
    pub channel_type: Option<String>,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub text: Option<String>,
    pub ts: Option<String>,
    pub thread_ts: Option<String>,
}

impl EventCallback {
    /// The bot's own user id, from the callback authorizations.
    pub fn bot_user_id(&self) -> Option<&str> {
        self.authorizations
            .iter()
            .find(|authorization| authorization.is_bot)
            .or_else(|| self.authorizations.first())
            .and_then(|authorization| authorization.user_id.as_deref())
    }

    /// Maps the inner event onto the events the bot reacts to. `bot_user_id`
    /// overrides the id found in `authorizations`; with neither, any message
    /// carrying a user mention is treated as addressed to the bot.
    pub fn into_event(self, bot_user_id: Option<&str>) -> SlackEvent {
        let bot_user_id = bot_user_id.or_else(|| self.bot_user_id()).map(str::to_owned);
        let event = self.event;
        let unsupported = SlackEvent::Unsupported { event_type: event.kind.clone() };

        match event.kind.as_str() {
            "app_mention" => {
                let (Some(channel_id), Some(user_id), Some(ts)) =
                    (event.channel, event.user, event.ts)
                else {
                    return unsupported;
                };
                SlackEvent::Mention(MentionEvent {
                    channel_id,
                    user_id,
                    text: strip_user_mentions(event.text.as_deref().unwrap_or_default()),
                    ts,
                    thread_ts: event.thread_ts,
                })
            }
            "message" => {
                if event.subtype.is_some()
                    || event.bot_id.is_some()
                    || event.channel_type.as_deref() == Some("im")
                {
                    return unsupported;
                }
                let (Some(channel_id), Some(user_id), Some(ts)) =
                    (event.channel, event.user, event.ts)
                else {
                    return unsupported;
                };
                if bot_user_id.as_deref() == Some(user_id.as_str()) {
                    return unsupported;
                }
                let text = event.text.unwrap_or_default();
                let mentions_bot = match &bot_user_id {
                    Some(bot) => text.contains(&format!("<@{bot}")),
                    None => text.contains("<@"),
                };
                if mentions_bot {
                    return unsupported;
                }
                SlackEvent::AmbientMessage(AmbientMessageEvent {
                    channel_id,
                    user_id,
                    text,
                    ts,
                    thread_ts: event.thread_ts,
                })
            }
            "member_joined_channel" => match (event.channel, event.user) {
                (Some(channel_id), Some(user)) if bot_user_id.as_deref() == Some(user.as_str()) => {
                    SlackEvent::ChannelJoined(ChannelJoinedEvent { channel_id })
                }
                _ => unsupported,
            },
            _ => unsupported,
        }
    }
}

/// `application/x-www-form-urlencoded` body of a slash command.
#[derive(Clone, Debug, Deserialize)]
pub struct SlashCommandForm {
    #[serde(default)]
    pub token: String,
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub response_url: String,
    pub trigger_id: Option<String>,
}

impl From<SlashCommandForm> for SlashCommandPayload {
    fn from(form: SlashCommandForm) -> Self {
        Self {
            command: form.command,
            text: form.text,
            channel_id: form.channel_id,
            user_id: form.user_id,
            response_url: form.response_url,
            trigger_id: form.trigger_id,
        }
    }
}

/// Form wrapper of an interactivity request; `payload` holds JSON.
#[derive(Clone, Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub token: String,
    pub trigger_id: Option<String>,
    pub user: Option<IdRef>,
    pub channel: Option<IdRef>,
    pub container: Option<Container>,
    pub message: Option<MessageRef>,
    pub response_url: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Container {
    pub channel_id: Option<String>,
    pub message_ts: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessageRef {
    pub ts: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Action {
    pub action_id: String,
    pub value: Option<String>,
}

impl InteractionPayload {
    pub fn parse(form: &InteractionForm) -> Result<Self, PayloadError> {
        serde_json::from_str(&form.payload)
            .map_err(|error| PayloadError::Malformed(error.to_string()))
    }

    /// First action of a `block_actions` payload as an event.
    pub fn into_event(self) -> SlackEvent {
        if self.kind != "block_actions" {
            return SlackEvent::Unsupported { event_type: self.kind };
        }

        let channel_id = self
            .channel
            .map(|channel| channel.id)
            .or_else(|| self.container.as_ref().and_then(|container| container.channel_id.clone()));
        let message_ts = self
            .message
            .map(|message| message.ts)
            .or_else(|| self.container.as_ref().and_then(|container| container.message_ts.clone()));

        match (channel_id, self.user, self.actions.into_iter().next()) {
            (Some(channel_id), Some(user), Some(action)) => {
                SlackEvent::BlockAction(BlockActionEvent {
                    channel_id,
                    message_ts: message_ts.unwrap_or_default(),
                    user_id: user.id,
                    action_id: action.action_id,
                    value: action.value,
                    response_url: self.response_url,
                })
            }
            _ => SlackEvent::Unsupported { event_type: self.kind },
        }
    }
}

/// Compares a request token with the configured verification token without
/// short-circuiting on the first differing byte.
pub fn verify_token(expected: &SecretString, provided: &str) -> bool {
    let expected = expected.expose_secret().as_bytes();
    let provided = provided.as_bytes();
    if expected.is_empty() || expected.len() != provided.len() {
        return false;
    }
    expected.iter().zip(provided).fold(0u8, |diff, (a, b)| diff | (a ^ b)) == 0
}
