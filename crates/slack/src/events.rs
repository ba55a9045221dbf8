use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use triviabot_core::{config::AmbientMode, FactLookup, ReplyTarget, Subject, TriviaRequest};

use crate::{
    api::{MessengerError, ResponseMessage, ResponseType, SlackMessenger},
    blocks::{
        category_choice_message, category_from_action_id, channel_welcome_message,
        command_error_message, fact_message, MessageTemplate, THINKING_REACTION,
    },
    commands::{
        command_subject, first_number, random_command_number, strip_user_mentions,
        SlashCommandPayload,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    AmbientMessage(AmbientMessageEvent),
    Mention(MentionEvent),
    BlockAction(BlockActionEvent),
    ChannelJoined(ChannelJoinedEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::AmbientMessage(_) => SlackEventType::AmbientMessage,
            Self::Mention(_) => SlackEventType::Mention,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::ChannelJoined(_) => SlackEventType::ChannelJoined,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    AmbientMessage,
    Mention,
    BlockAction,
    ChannelJoined,
    Unsupported,
}

/// A channel message that does not mention the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmbientMessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl AmbientMessageEvent {
    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget { channel_id: self.channel_id.clone(), thread_ts: self.thread_ts.clone() }
    }
}

/// A message addressed to the bot, with mention tokens already stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl MentionEvent {
    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget { channel_id: self.channel_id.clone(), thread_ts: self.thread_ts.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub message_ts: String,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
    pub response_url: Option<String>,
}

/// The bot itself joined `channel_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelJoinedEvent {
    pub channel_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Messenger(#[from] MessengerError),
    #[error("mention handler failure: {0}")]
    Mention(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerSettings {
    pub slash_command: String,
    pub ambient_mode: AmbientMode,
}

/// Dispatcher with every trivia handler registered.
pub fn trivia_dispatcher<M>(
    settings: HandlerSettings,
    facts: Arc<dyn FactLookup>,
    messenger: Arc<dyn SlackMessenger>,
    mentions: M,
) -> EventDispatcher
where
    M: MentionService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(
        settings.slash_command,
        Arc::clone(&facts),
        Arc::clone(&messenger),
    ));
    dispatcher.register(AmbientMessageHandler::new(
        settings.ambient_mode,
        Arc::clone(&facts),
        Arc::clone(&messenger),
    ));
    dispatcher.register(BlockActionHandler::new(facts, Arc::clone(&messenger)));
    dispatcher.register(ChannelJoinedHandler::new(messenger));
    dispatcher.register(MentionHandler::new(mentions));
    dispatcher
}

/// Looks up a fact, turning any failure into the standard error reply.
async fn fact_or_error(facts: &dyn FactLookup, request: &TriviaRequest) -> MessageTemplate {
    match facts.lookup(request).await {
        Ok(fact) => fact_message(&fact),
        Err(error) => {
            warn!(
                event_name = "slack.events.lookup_failed",
                path = %request.path(),
                error = %error,
                "trivia lookup failed"
            );
            command_error_message()
        }
    }
}

pub struct SlashCommandHandler {
    command: String,
    facts: Arc<dyn FactLookup>,
    messenger: Arc<dyn SlackMessenger>,
}

impl SlashCommandHandler {
    pub fn new(
        command: impl Into<String>,
        facts: Arc<dyn FactLookup>,
        messenger: Arc<dyn SlackMessenger>,
    ) -> Self {
        Self { command: command.into(), facts, messenger }
    }
}

#[async_trait]
impl EventHandler for SlashCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = match command_subject(&self.command, payload, random_command_number) {
            Ok(subject) => {
                fact_or_error(self.facts.as_ref(), &TriviaRequest::general(subject)).await
            }
            Err(error) => {
                info!(
                    event_name = "slack.events.command_rejected",
                    correlation_id = %ctx.correlation_id,
                    user_id = %payload.user_id,
                    command = %payload.command,
                    error = %error,
                    "slash command rejected"
                );
                command_error_message()
            }
        };

        self.messenger
            .respond(
                &payload.response_url,
                &ResponseMessage::replacing(message.clone(), ResponseType::Ephemeral),
            )
            .await?;
        Ok(HandlerResult::Responded(message))
    }
}

pub struct AmbientMessageHandler {
    mode: AmbientMode,
    facts: Arc<dyn FactLookup>,
    messenger: Arc<dyn SlackMessenger>,
}

impl AmbientMessageHandler {
    pub fn new(
        mode: AmbientMode,
        facts: Arc<dyn FactLookup>,
        messenger: Arc<dyn SlackMessenger>,
    ) -> Self {
        Self { mode, facts, messenger }
    }
}

#[async_trait]
impl EventHandler for AmbientMessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AmbientMessage
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AmbientMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let text = strip_user_mentions(&event.text);
        let Some(number) = first_number(&text) else {
            return Ok(HandlerResult::Ignored);
        };

        if let Err(error) =
            self.messenger.add_reaction(&event.channel_id, &event.ts, THINKING_REACTION).await
        {
            warn!(
                event_name = "slack.events.reaction_failed",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                error = %error,
                "could not add thinking reaction"
            );
        }

        let message = match self.mode {
            AmbientMode::Buttons => category_choice_message(number),
            AmbientMode::Immediate => match Subject::parse(number) {
                Ok(subject) => {
                    fact_or_error(self.facts.as_ref(), &TriviaRequest::general(subject)).await
                }
                Err(_) => return Ok(HandlerResult::Ignored),
            },
        };

        self.messenger.post_message(&event.reply_target(), &message).await?;
        Ok(HandlerResult::Responded(message))
    }
}

pub struct BlockActionHandler {
    facts: Arc<dyn FactLookup>,
    messenger: Arc<dyn SlackMessenger>,
}

impl BlockActionHandler {
    pub fn new(facts: Arc<dyn FactLookup>, messenger: Arc<dyn SlackMessenger>) -> Self {
        Self { facts, messenger }
    }
}

#[async_trait]
impl EventHandler for BlockActionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(category) = category_from_action_id(&event.action_id) else {
            return Ok(HandlerResult::Ignored);
        };

        let message = match event.value.as_deref().map(Subject::parse) {
            Some(Ok(subject)) => {
                fact_or_error(self.facts.as_ref(), &TriviaRequest::new(subject, category)).await
            }
            _ => {
                info!(
                    event_name = "slack.events.action_rejected",
                    correlation_id = %ctx.correlation_id,
                    action_id = %event.action_id,
                    "category button carried no usable number"
                );
                command_error_message()
            }
        };

        match &event.response_url {
            Some(response_url) => {
                let response = ResponseMessage::replacing(message.clone(), ResponseType::InChannel);
                self.messenger.respond(response_url, &response).await?;
            }
            None => {
                self.messenger
                    .post_message(&ReplyTarget::channel(event.channel_id.clone()), &message)
                    .await?;
            }
        }
        Ok(HandlerResult::Responded(message))
    }
}

pub struct ChannelJoinedHandler {
    messenger: Arc<dyn SlackMessenger>,
}

impl ChannelJoinedHandler {
    pub fn new(messenger: Arc<dyn SlackMessenger>) -> Self {
        Self { messenger }
    }
}

#[async_trait]
impl EventHandler for ChannelJoinedHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ChannelJoined
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ChannelJoined(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = channel_welcome_message(&event.channel_id);
        self.messenger
            .post_message(&ReplyTarget::channel(event.channel_id.clone()), &message)
            .await?;
        Ok(HandlerResult::Responded(message))
    }
}

/// Conversational handling of messages addressed to the bot.
#[async_trait]
pub trait MentionService: Send + Sync {
    async fn handle_mention(
        &self,
        event: &MentionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;
}

pub struct MentionHandler<S> {
    service: S,
}

impl<S> MentionHandler<S>
where
    S: MentionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MentionHandler<S>
where
    S: MentionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Mention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Mention(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_mention(event, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}
