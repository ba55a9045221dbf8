use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use triviabot_agent::nlu::{EntitySet, NluClient, NluError};
use triviabot_core::config::NluConfig;

/// Wit.ai `/message` client.
pub struct HttpNluClient {
    client: Client,
    base_url: String,
    api_version: String,
    access_token: SecretString,
}

impl HttpNluClient {
    pub fn new(config: &NluConfig) -> Result<Self, NluError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| NluError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl NluClient for HttpNluClient {
    async fn extract(&self, text: &str) -> Result<EntitySet, NluError> {
        let response = self
            .client
            .get(format!("{}/message", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("v", self.api_version.as_str()), ("q", text)])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NluError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| NluError::InvalidResponse(error.to_string()))?;
        let entities = EntitySet::from_wit_response(&body)?;
        debug!(
            event_name = "nlu.wit.extracted",
            entities = ?entities.names().collect::<Vec<_>>(),
            "wit entities extracted"
        );
        Ok(entities)
    }
}

fn request_error(error: reqwest::Error) -> NluError {
    if error.is_timeout() {
        NluError::Timeout
    } else {
        NluError::Transport(error.to_string())
    }
}
