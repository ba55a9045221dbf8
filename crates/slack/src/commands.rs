use rand::Rng;
use thiserror::Error;
use triviabot_core::{Subject, SubjectError};

/// Range an empty slash command draws its number from.
pub const RANDOM_COMMAND_RANGE: std::ops::Range<i64> = 0..100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub response_url: String,
    pub trigger_id: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("invalid trivia subject: {0}")]
    InvalidSubject(#[from] SubjectError),
}

/// Trivia subject for a slash command. Empty text draws a number with
/// `pick_random`.
pub fn command_subject(
    expected_command: &str,
    payload: &SlashCommandPayload,
    pick_random: impl FnOnce() -> i64,
) -> Result<Subject, CommandParseError> {
    if payload.command != expected_command {
        return Err(CommandParseError::UnsupportedCommand(payload.command.clone()));
    }

    let text = payload.text.trim();
    if text.is_empty() {
        return Ok(Subject::number(pick_random()));
    }
    Ok(Subject::parse(text)?)
}

pub fn random_command_number() -> i64 {
    rand::thread_rng().gen_range(RANDOM_COMMAND_RANGE)
}

/// First run of ASCII digits in an ambient message.
pub fn first_number(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Removes `<@U123>` user mention tokens and collapses the remaining spaces.
pub fn strip_user_mentions(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<@") {
        stripped.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                stripped.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    stripped.push_str(rest);
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{
        command_subject, first_number, random_command_number, strip_user_mentions,
        CommandParseError, SlashCommandPayload, RANDOM_COMMAND_RANGE,
    };

    fn payload(command: &str, text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: command.to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            response_url: "https://hooks.slack.test/commands/1".to_owned(),
            trigger_id: None,
        }
    }

    #[test]
    fn command_text_becomes_subject() {
        let subject = command_subject("/trivia", &payload("/trivia", " 42 "), || 7).expect("parse");
        assert_eq!(subject.as_str(), "42");
    }

    #[test]
    fn empty_command_text_draws_random_number() {
        let subject = command_subject("/trivia", &payload("/trivia", ""), || 17).expect("parse");
        assert_eq!(subject.as_str(), "17");
    }

    #[test]
    fn random_command_number_stays_in_range() {
        for _ in 0..200 {
            assert!(RANDOM_COMMAND_RANGE.contains(&random_command_number()));
        }
    }

    #[test]
    fn rejects_other_commands_and_unsafe_text() {
        assert!(matches!(
            command_subject("/trivia", &payload("/quote", "42"), || 0),
            Err(CommandParseError::UnsupportedCommand(command)) if command == "/quote"
        ));
        assert!(matches!(
            command_subject("/trivia", &payload("/trivia", "../admin"), || 0),
            Err(CommandParseError::InvalidSubject(_))
        ));
    }

    #[test]
    fn first_number_finds_leading_digit_run() {
        assert_eq!(first_number("I have 12 cats and 3 dogs"), Some("12"));
        assert_eq!(first_number("2024 was long"), Some("2024"));
        assert_eq!(first_number("no digits here"), None);
    }

    #[test]
    fn mention_tokens_are_removed() {
        assert_eq!(strip_user_mentions("<@U0BOT> tell me about  42"), "tell me about 42");
        assert_eq!(strip_user_mentions("hey <@U1|alice>, 7?"), "hey , 7?");
        assert_eq!(strip_user_mentions("broken <@U1"), "broken <@U1");
    }
}
