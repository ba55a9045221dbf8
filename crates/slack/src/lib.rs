//! Slack integration for the trivia bot
//!
//! - **Payloads** (`payloads`) - Events API, slash command and interactivity bodies
//! - **Events** (`events`) - Dispatcher and the trivia handlers
//! - **Slash Commands** (`commands`) - `/trivia <number>` parsing and text helpers
//! - **Block Kit** (`blocks`) - Message builders, category buttons and fixed texts
//! - **Web API** (`api`) - `SlackMessenger` and its reqwest implementation
//!
//! # Architecture
//!
//! ```text
//! HTTP ingress → payloads → EventDispatcher → Handlers → Numbers API
//!                                  ↓
//!                    MentionService (conversation runtime)
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod payloads;
