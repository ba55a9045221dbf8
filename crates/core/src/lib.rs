pub mod config;
pub mod domain;
pub mod errors;
pub mod facts;

pub use domain::conversation::{ConversationContext, ReplyTarget};
pub use domain::trivia::{Category, FactPresentation, Subject, SubjectError, TriviaRequest};
pub use errors::{ApplicationError, InterfaceError};
pub use facts::{FactError, FactLookup, RetryPolicy};
