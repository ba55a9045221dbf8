use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tracing::info;
use triviabot_agent::{
    nlu::NluError, resolver::IntentResolver, runtime::AgentRuntime, sessions::SessionStore,
};
use triviabot_core::{config::AppConfig, FactError, FactLookup, FactPresentation};
use triviabot_slack::{
    api::{MessengerError, SlackMessenger, WebApiMessenger},
    events::{trivia_dispatcher, HandlerSettings},
};

use crate::{
    broadcast::Broadcaster,
    conversation::{RuntimeMentionService, SlackResponder},
    health,
    ingress::{self, IngressState},
    numbers::HttpFactClient,
    wit::HttpNluClient,
};

const SLACK_API_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Application {
    pub config: AppConfig,
    pub sessions: Arc<SessionStore>,
    pub router: Router,
    pub broadcaster: Option<Broadcaster>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("numbers client setup failed: {0}")]
    FactClient(#[source] FactError),
    #[error("nlu client setup failed: {0}")]
    NluClient(#[source] NluError),
    #[error("slack client setup failed: {0}")]
    Messenger(#[source] MessengerError),
    #[error("slack auth.test failed: {0}")]
    SlackAuth(#[source] MessengerError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let facts: Arc<dyn FactLookup> =
        Arc::new(HttpFactClient::new(&config.numbers).map_err(BootstrapError::FactClient)?);
    let nlu = Arc::new(HttpNluClient::new(&config.nlu).map_err(BootstrapError::NluClient)?);
    let web_api = WebApiMessenger::new(
        config.slack.api_base_url.clone(),
        config.slack.bot_token.clone(),
        SLACK_API_TIMEOUT,
    )
    .map_err(BootstrapError::Messenger)?;
    let bot_user_id = web_api.auth_test().await.map_err(BootstrapError::SlackAuth)?;
    let messenger: Arc<dyn SlackMessenger> = Arc::new(web_api);
    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        numbers_base_url = %config.numbers.base_url,
        nlu_base_url = %config.nlu.base_url,
        bot_user_id = %bot_user_id,
        "outbound clients configured"
    );

    let sessions = Arc::new(SessionStore::new());
    let runtime = Arc::new(AgentRuntime::new(
        Arc::clone(&sessions),
        nlu,
        IntentResolver::new(
            Arc::clone(&facts),
            FactPresentation { decorate: config.conversation.decorate_facts },
        ),
        Arc::new(SlackResponder::new(Arc::clone(&messenger))),
    ));

    let dispatcher = trivia_dispatcher(
        HandlerSettings {
            slash_command: config.slack.slash_command.clone(),
            ambient_mode: config.conversation.ambient_mode,
        },
        Arc::clone(&facts),
        Arc::clone(&messenger),
        RuntimeMentionService::new(runtime),
    );
    let state = IngressState::new(config.slack.verification_token.clone(), Arc::new(dispatcher))
        .with_bot_user_id(bot_user_id);
    let router = ingress::router(state).merge(health::router(Arc::clone(&sessions)));

    let broadcaster = (config.broadcast.enabled && !config.broadcast.webhook_urls.is_empty())
        .then(|| Broadcaster::new(facts, messenger, config.broadcast.webhook_urls.clone()));
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        ambient_mode = ?config.conversation.ambient_mode,
        broadcast = broadcaster.is_some(),
        "application wired"
    );

    Ok(Application { config, sessions, router, broadcaster })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use triviabot_core::config::{AmbientMode, AppConfig, ConfigOverrides, LoadOptions};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{bootstrap_with_config, BootstrapError};

    fn overrides() -> ConfigOverrides {
        ConfigOverrides {
            slack_bot_token: Some("xoxb-test".to_owned()),
            slack_verification_token: Some("verify-me".to_owned()),
            nlu_access_token: Some("wit-test".to_owned()),
            ..ConfigOverrides::default()
        }
    }

    fn config_for(overrides: ConfigOverrides, slack: &MockServer) -> AppConfig {
        let mut config = AppConfig::load(LoadOptions {
            config_path: Some("/nonexistent/triviabot.toml".into()),
            overrides,
            ..LoadOptions::default()
        })
        .expect("config");
        config.slack.api_base_url = slack.uri();
        config
    }

    async fn slack_api(reply: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn bootstrap_wires_application_from_overrides() {
        let slack = slack_api(json!({ "ok": true, "user_id": "UBOT" })).await;
        let config = config_for(
            ConfigOverrides {
                broadcast_enabled: Some(false),
                ambient_mode: Some(AmbientMode::Immediate),
                ..overrides()
            },
            &slack,
        );

        let app = bootstrap_with_config(config).await.expect("bootstrap");

        assert!(app.broadcaster.is_none());
        assert_eq!(app.config.conversation.ambient_mode, AmbientMode::Immediate);
    }

    #[tokio::test]
    async fn bootstrap_fails_when_slack_rejects_the_token() {
        let slack = slack_api(json!({ "ok": false, "error": "invalid_auth" })).await;

        let result = bootstrap_with_config(config_for(overrides(), &slack)).await;

        assert!(matches!(result, Err(BootstrapError::SlackAuth(_))));
    }
}
