use serde::{Deserialize, Serialize};

use crate::domain::trivia::Category;

/// Where a reply to the originating conversation goes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub channel_id: String,
    pub thread_ts: Option<String>,
}

impl ReplyTarget {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), thread_ts: None }
    }

    pub fn thread(channel_id: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), thread_ts: Some(thread_ts.into()) }
    }
}

/// Slot-filling state carried between turns of one user's conversation.
///
/// `category: None` means no category has been stored yet; `Some(General)` is
/// a stored general request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing_number: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
}

impl ConversationContext {
    pub fn is_awaiting_subject(&self) -> bool {
        self.missing_number && !self.done
    }
}
