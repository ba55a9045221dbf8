pub mod conversation;
pub mod trivia;
