use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use triviabot_core::{
    config::NumbersConfig, FactError, FactLookup, RetryPolicy, TriviaRequest,
};

/// [`FactLookup`] backed by the Numbers API, which answers
/// `GET {base}/{subject}/{category}` with a plain-text fact.
pub struct HttpFactClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpFactClient {
    pub fn new(config: &NumbersConfig) -> Result<Self, FactError> {
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            base_delay_ms: config.retry_backoff_ms,
            ..RetryPolicy::default()
        };
        Self::with_timeout(&config.base_url, Duration::from_secs(config.timeout_secs), retry)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, FactError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| FactError::Transport(error.to_string()))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned(), retry })
    }

    pub fn url_for(&self, request: &TriviaRequest) -> String {
        format!("{}/{}", self.base_url, request.path())
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FactError> {
        let response = self.client.get(url).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FactError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(request_error)?;
        let fact = body.trim();
        if fact.is_empty() {
            return Err(FactError::EmptyFact);
        }
        Ok(fact.to_owned())
    }
}

#[async_trait]
impl FactLookup for HttpFactClient {
    async fn lookup(&self, request: &TriviaRequest) -> Result<String, FactError> {
        let url = self.url_for(request);
        let mut attempt = 0;
        loop {
            match self.fetch_once(&url).await {
                Ok(fact) => {
                    debug!(
                        event_name = "numbers.lookup.succeeded",
                        url = %url,
                        attempt,
                        "fact fetched"
                    );
                    return Ok(fact);
                }
                Err(error) if error.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        event_name = "numbers.lookup.retrying",
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "fact lookup failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn request_error(error: reqwest::Error) -> FactError {
    if error.is_timeout() {
        FactError::Timeout
    } else {
        FactError::Transport(error.to_string())
    }
}
