use async_trait::async_trait;
use thiserror::Error;
use triviabot_core::ReplyTarget;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply delivery failed: {0}")]
    Delivery(String),
}

/// Posts conversation replies back to the chat platform.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn send(&self, target: &ReplyTarget, text: &str) -> Result<(), ReplyError>;
}
