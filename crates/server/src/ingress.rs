//! Slack HTTP ingress.
//!
//! - `POST /slack/events`   - Events API (`url_verification`, `event_callback`)
//! - `POST /slack/commands` - slash commands, acknowledged immediately
//! - `POST /slack/actions`  - interactive button callbacks
//!
//! Every request is checked against the verification token, acknowledged, and
//! then dispatched on a spawned task.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Form, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use triviabot_core::{ApplicationError, InterfaceError};
use triviabot_slack::{
    api::{ResponseMessage, ResponseType},
    blocks::command_ack_message,
    events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent},
    payloads::{
        verify_token, EventsApiPayload, InteractionForm, InteractionPayload, PayloadError,
        SlashCommandForm,
    },
};
use uuid::Uuid;

const RETRY_HEADER: &str = "x-slack-retry-num";

#[derive(Clone)]
pub struct IngressState {
    verification_token: SecretString,
    dispatcher: Arc<EventDispatcher>,
    bot_user_id: Option<Arc<str>>,
}

impl IngressState {
    pub fn new(verification_token: SecretString, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { verification_token, dispatcher, bot_user_id: None }
    }

    /// The bot's own user id, used to tell mentions of the bot apart from
    /// mentions of anyone else.
    pub fn with_bot_user_id(mut self, bot_user_id: impl Into<Arc<str>>) -> Self {
        self.bot_user_id = Some(bot_user_id.into());
        self
    }

    fn verify(&self, token: &str) -> Result<(), IngressError> {
        if verify_token(&self.verification_token, token) {
            Ok(())
        } else {
            Err(IngressError::InvalidToken)
        }
    }

    fn spawn_dispatch(&self, envelope: SlackEnvelope, correlation_id: String) {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let ctx = EventContext { correlation_id };
            match dispatcher.dispatch(&envelope, &ctx).await {
                Ok(result) => debug!(
                    event_name = "system.ingress.dispatched",
                    correlation_id = %ctx.correlation_id,
                    envelope_id = %envelope.envelope_id,
                    handled = !matches!(result, HandlerResult::Ignored),
                    "slack event dispatched"
                ),
                Err(error) => warn!(
                    event_name = "system.ingress.dispatch_failed",
                    correlation_id = %ctx.correlation_id,
                    envelope_id = %envelope.envelope_id,
                    error = %error,
                    "slack event handler failed"
                ),
            }
        });
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngressError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("verification token mismatch")]
    InvalidToken,
}

impl From<IngressError> for ApplicationError {
    fn from(value: IngressError) -> Self {
        match value {
            IngressError::Payload(error) => Self::InvalidInput(error.to_string()),
            IngressError::InvalidToken => {
                Self::Unauthorized("verification token mismatch".to_owned())
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

fn reject(error: IngressError, route: &'static str, correlation_id: &str) -> ApiError {
    warn!(
        event_name = "system.ingress.rejected",
        correlation_id,
        route,
        error = %error,
        "slack request rejected"
    );
    ApiError(ApplicationError::from(error).into_interface(correlation_id))
}

pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/slack/commands", post(slack_commands))
        .route("/slack/actions", post(slack_actions))
        .with_state(state)
}

async fn slack_events(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let route = "/slack/events";
    let payload = EventsApiPayload::parse(&body)
        .map_err(|error| reject(error.into(), route, &correlation_id))?;
    state
        .verify(payload.token().unwrap_or_default())
        .map_err(|error| reject(error, route, &correlation_id))?;

    match payload {
        EventsApiPayload::UrlVerification { challenge, .. } => {
            Ok(Json(json!({ "challenge": challenge })).into_response())
        }
        EventsApiPayload::EventCallback(callback) => {
            if let Some(retry) = headers.get(RETRY_HEADER) {
                info!(
                    event_name = "system.ingress.retry_skipped",
                    correlation_id = %correlation_id,
                    retry = ?retry,
                    "slack redelivery acknowledged without dispatch"
                );
                return Ok(StatusCode::OK.into_response());
            }
            let envelope_id = callback.event_id.clone().unwrap_or_else(|| correlation_id.clone());
            let event = callback.into_event(state.bot_user_id.as_deref());
            if !matches!(event, SlackEvent::Unsupported { .. }) {
                state.spawn_dispatch(SlackEnvelope { envelope_id, event }, correlation_id);
            }
            Ok(StatusCode::OK.into_response())
        }
        EventsApiPayload::Unknown => Ok(StatusCode::OK.into_response()),
    }
}

async fn slack_commands(
    State(state): State<IngressState>,
    Form(form): Form<SlashCommandForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    state.verify(&form.token).map_err(|error| reject(error, "/slack/commands", &correlation_id))?;

    let envelope_id = form.trigger_id.clone().unwrap_or_else(|| correlation_id.clone());
    let event = SlackEvent::SlashCommand(form.into());
    state.spawn_dispatch(SlackEnvelope { envelope_id, event }, correlation_id);

    Ok(Json(ResponseMessage::new(command_ack_message(), ResponseType::Ephemeral).to_json()))
}

async fn slack_actions(
    State(state): State<IngressState>,
    Form(form): Form<InteractionForm>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let route = "/slack/actions";
    let payload = InteractionPayload::parse(&form)
        .map_err(|error| reject(error.into(), route, &correlation_id))?;
    state.verify(&payload.token).map_err(|error| reject(error, route, &correlation_id))?;

    let envelope_id = payload.trigger_id.clone().unwrap_or_else(|| correlation_id.clone());
    let event = payload.into_event();
    state.spawn_dispatch(SlackEnvelope { envelope_id, event }, correlation_id);
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use triviabot_core::{config::AmbientMode, ReplyTarget};
    use triviabot_slack::blocks::COMMAND_ERROR_TEXT;
    use triviabot_slack::events::{
        trivia_dispatcher, EventContext, EventHandlerError, HandlerSettings, MentionEvent,
        MentionService,
    };

    use super::{router, IngressState};
    use crate::testing::{RecordingMessenger, Sent, StubFacts};

    struct NoMentions;

    #[async_trait::async_trait]
    impl MentionService for NoMentions {
        async fn handle_mention(
            &self,
            _event: &MentionEvent,
            _ctx: &EventContext,
        ) -> Result<(), EventHandlerError> {
            Ok(())
        }
    }

    fn app() -> (Router, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::default());
        let dispatcher = trivia_dispatcher(
            HandlerSettings {
                slash_command: "/trivia".to_owned(),
                ambient_mode: AmbientMode::Buttons,
            },
            Arc::new(StubFacts::default()),
            messenger.clone(),
            NoMentions,
        );
        let state = IngressState::new("verify-me".to_owned().into(), Arc::new(dispatcher))
            .with_bot_user_id("UBOT");
        (router(state), messenger)
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn form_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
        let body = serde_urlencoded::to_string(fields).expect("form body");
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let (app, _) = app();

        let response = app
            .oneshot(json_request(
                "/slack/events",
                json!({ "type": "url_verification", "token": "verify-me", "challenge": "c-123" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "challenge": "c-123" }));
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized_and_not_dispatched() {
        let (app, messenger) = app();

        let response = app
            .oneshot(form_request(
                "/slack/commands",
                &[
                    ("token", "forged"),
                    ("command", "/trivia"),
                    ("text", "42"),
                    ("channel_id", "C1"),
                    ("user_id", "U1"),
                    ("response_url", "https://hooks.slack.test/commands/1"),
                ],
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "The request could not be verified.");
        tokio::task::yield_now().await;
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn slash_command_is_acknowledged_then_answered() {
        let (app, messenger) = app();

        let response = app
            .oneshot(form_request(
                "/slack/commands",
                &[
                    ("token", "verify-me"),
                    ("command", "/trivia"),
                    ("text", "42"),
                    ("channel_id", "C1"),
                    ("user_id", "U1"),
                    ("response_url", "https://hooks.slack.test/commands/1"),
                    ("trigger_id", "trigger-1"),
                ],
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "response_type": "ephemeral", "text": "Command received :hourglass:" })
        );
        assert_eq!(
            messenger.wait_for(1).await,
            vec![Sent::Respond(
                "https://hooks.slack.test/commands/1".to_owned(),
                "fact for 42/".to_owned()
            )]
        );
    }

    #[tokio::test]
    async fn ambient_message_event_is_dispatched() {
        let (app, messenger) = app();

        let response = app
            .oneshot(json_request(
                "/slack/events",
                json!({
                    "type": "event_callback",
                    "token": "verify-me",
                    "event_id": "Ev42",
                    "authorizations": [{ "user_id": "UBOT", "is_bot": true }],
                    "event": {
                        "type": "message",
                        "channel": "C1",
                        "user": "U1",
                        "text": "there are 12 of us",
                        "ts": "1700000000.0001"
                    }
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            messenger.wait_for(2).await,
            vec![
                Sent::Reaction("C1".to_owned(), "thinking_face".to_owned()),
                Sent::Post(
                    ReplyTarget::channel("C1"),
                    "What kind of trivia about 12 do you want?".to_owned()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn message_mentioning_another_user_is_still_ambient() {
        let (app, messenger) = app();

        let response = app
            .oneshot(json_request(
                "/slack/events",
                json!({
                    "type": "event_callback",
                    "token": "verify-me",
                    "event_id": "Ev43",
                    "event": {
                        "type": "message",
                        "channel": "C1",
                        "user": "U1",
                        "text": "<@U2> we have 12 chairs",
                        "ts": "1700000000.0003"
                    }
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            messenger.wait_for(2).await,
            vec![
                Sent::Reaction("C1".to_owned(), "thinking_face".to_owned()),
                Sent::Post(
                    ReplyTarget::channel("C1"),
                    "What kind of trivia about 12 do you want?".to_owned()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_slash_command_ack_is_replaced_with_error_text() {
        let (app, messenger) = app();

        let response = app
            .oneshot(form_request(
                "/slack/commands",
                &[
                    ("token", "verify-me"),
                    ("command", "/numbers"),
                    ("text", "42"),
                    ("channel_id", "C1"),
                    ("user_id", "U1"),
                    ("response_url", "https://hooks.slack.test/commands/2"),
                ],
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            messenger.wait_for(1).await,
            vec![Sent::Respond(
                "https://hooks.slack.test/commands/2".to_owned(),
                COMMAND_ERROR_TEXT.to_owned()
            )]
        );
    }

    #[tokio::test]
    async fn redelivered_event_is_acknowledged_without_dispatch() {
        let (app, messenger) = app();
        let mut request = json_request(
            "/slack/events",
            json!({
                "type": "event_callback",
                "token": "verify-me",
                "event": { "type": "member_joined_channel", "channel": "C1", "user": "UBOT" },
                "authorizations": [{ "user_id": "UBOT", "is_bot": true }]
            }),
        );
        request.headers_mut().insert("x-slack-retry-num", "1".parse().expect("header"));

        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        tokio::task::yield_now().await;
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn category_button_callback_is_dispatched() {
        let (app, messenger) = app();
        let payload = json!({
            "type": "block_actions",
            "token": "verify-me",
            "user": { "id": "U2" },
            "channel": { "id": "C1" },
            "message": { "ts": "1700000000.0002" },
            "response_url": "https://hooks.slack.test/actions/1",
            "actions": [{ "action_id": "trivia.category.math", "value": "42" }]
        })
        .to_string();

        let response = app
            .oneshot(form_request("/slack/actions", &[("payload", &payload)]))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            messenger.wait_for(1).await,
            vec![Sent::Respond(
                "https://hooks.slack.test/actions/1".to_owned(),
                "fact for 42/math".to_owned()
            )]
        );
    }

    #[tokio::test]
    async fn malformed_event_body_is_bad_request() {
        let (app, _) = app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
