use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RANDOM_SUBJECT: &str = "random";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    General,
    Math,
    Date,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::General, Category::Math, Category::Date];

    /// Accepts the names used by the NLU `type` entity and the category buttons.
    /// An empty string is the general category.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "general" | "trivia" => Some(Self::General),
            "math" => Some(Self::Math),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Math => "math",
            Self::Date => "date",
        }
    }

    /// Path segment understood by the Numbers API; general trivia has none.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::General => "",
            Self::Math => "math",
            Self::Date => "date",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Math => "Math",
            Self::Date => "Date",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubjectError {
    #[error("trivia subject is empty")]
    Empty,
    #[error("`{0}` is not a number, a month/day date, or `random`")]
    Unsupported(String),
}

/// Value the Numbers API is asked about: a number, a `M/D` date, or `random`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject(String);

impl Subject {
    pub fn random() -> Self {
        Self(RANDOM_SUBJECT.to_owned())
    }

    pub fn number(value: i64) -> Self {
        Self(value.to_string())
    }

    pub fn date(month: u32, day: u32) -> Self {
        Self(format!("{month}/{day}"))
    }

    pub fn parse(raw: &str) -> Result<Self, SubjectError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SubjectError::Empty);
        }
        if trimmed.eq_ignore_ascii_case(RANDOM_SUBJECT) {
            return Ok(Self::random());
        }
        if is_number(trimmed) || is_month_day(trimmed) {
            return Ok(Self(trimmed.to_owned()));
        }
        Err(SubjectError::Unsupported(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_random(&self) -> bool {
        self.0 == RANDOM_SUBJECT
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_number(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    !whole.is_empty()
        && whole.bytes().all(|byte| byte.is_ascii_digit())
        && fraction.map_or(true, |fraction| {
            !fraction.is_empty() && fraction.bytes().all(|byte| byte.is_ascii_digit())
        })
}

fn is_month_day(value: &str) -> bool {
    let Some((month, day)) = value.split_once('/') else {
        return false;
    };
    matches!(
        (month.parse::<u32>(), day.parse::<u32>()),
        (Ok(1..=12), Ok(1..=31))
    )
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaRequest {
    pub subject: Subject,
    pub category: Category,
}

impl TriviaRequest {
    pub fn new(subject: Subject, category: Category) -> Self {
        Self { subject, category }
    }

    pub fn general(subject: Subject) -> Self {
        Self::new(subject, Category::General)
    }

    /// `{subject}/{category}`; general requests keep the trailing slash (`42/`).
    pub fn path(&self) -> String {
        format!("{}/{}", self.subject, self.category.path_segment())
    }
}

/// Formatting applied to a fact before it is posted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FactPresentation {
    pub decorate: bool,
}

impl Default for FactPresentation {
    fn default() -> Self {
        Self { decorate: true }
    }
}

impl FactPresentation {
    pub fn render(&self, fact: &str) -> String {
        if self.decorate {
            format!("*This is what I found* :point_down:\n_{fact}_")
        } else {
            fact.to_owned()
        }
    }
}
