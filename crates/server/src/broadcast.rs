use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};
use triviabot_core::{Category, FactLookup, Subject, TriviaRequest};
use triviabot_slack::{api::SlackMessenger, blocks::MessageTemplate};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Pushes the date fact of the day to every configured incoming webhook.
pub struct Broadcaster {
    facts: Arc<dyn FactLookup>,
    messenger: Arc<dyn SlackMessenger>,
    webhook_urls: Vec<String>,
}

impl Broadcaster {
    pub fn new(
        facts: Arc<dyn FactLookup>,
        messenger: Arc<dyn SlackMessenger>,
        webhook_urls: Vec<String>,
    ) -> Self {
        Self { facts, messenger, webhook_urls }
    }

    pub fn request_for(date: NaiveDate) -> TriviaRequest {
        TriviaRequest::new(Subject::date(date.month(), date.day()), Category::Date)
    }

    pub async fn broadcast_once(&self, today: NaiveDate) -> BroadcastReport {
        let request = Self::request_for(today);
        let fact = match self.facts.lookup(&request).await {
            Ok(fact) => fact,
            Err(error) => {
                warn!(
                    event_name = "system.broadcast.lookup_failed",
                    correlation_id = "broadcast",
                    path = %request.path(),
                    error = %error,
                    "date fact lookup failed; skipping broadcast"
                );
                return BroadcastReport::default();
            }
        };

        let message = MessageTemplate::text(fact);
        let mut report = BroadcastReport::default();
        for webhook_url in &self.webhook_urls {
            match self.messenger.send_webhook(webhook_url, &message).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        event_name = "system.broadcast.webhook_failed",
                        correlation_id = "broadcast",
                        error = %error,
                        "webhook delivery failed"
                    );
                }
            }
        }

        info!(
            event_name = "system.broadcast.completed",
            correlation_id = "broadcast",
            path = %request.path(),
            delivered = report.delivered,
            failed = report.failed,
            "daily trivia broadcast sent"
        );
        report
    }

    /// Broadcasts every `period`, first one `period` after start.
    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                self.broadcast_once(Local::now().date_naive()).await;
            }
        })
    }
}
