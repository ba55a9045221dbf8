//! Conversation agent - intent resolution for trivia requests
//!
//! This crate owns the multi-turn part of the bot:
//! - **NLU** (`nlu`) - entity set model and the extraction client seam
//! - **Intent Resolver** (`resolver`) - decides between answering and asking for a number
//! - **Sessions** (`sessions`) - per-user conversation state with idle eviction
//! - **Runtime** (`runtime`) - runs one conversation turn end to end
//!
//! # Flow
//!
//! ```text
//! mention text → SessionStore → NluClient → IntentResolver → FactLookup
//!                                                 ↓
//!                                  Responder ← response / follow-up
//! ```
//!
//! Slash commands, ambient numbers and button clicks never reach this crate;
//! they call the fact lookup directly from the Slack layer.

pub mod nlu;
pub mod reply;
pub mod resolver;
pub mod runtime;
pub mod sessions;
