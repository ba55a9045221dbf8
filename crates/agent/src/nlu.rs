use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use triviabot_core::{Category, Subject};

pub const INTENT: &str = "intent";
pub const NUMBER: &str = "number";
pub const RANDOM: &str = "random";
pub const TYPE: &str = "type";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityCandidate {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl EntityCandidate {
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into(), confidence: None }
    }
}

/// Entities extracted from one utterance, keyed by entity name. Every stored
/// list is non-empty and ordered best candidate first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntitySet {
    entities: BTreeMap<String, Vec<EntityCandidate>>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.push(name, EntityCandidate::new(value));
        self
    }

    pub fn push(&mut self, name: &str, candidate: EntityCandidate) {
        self.entities.entry(name.to_owned()).or_default().push(candidate);
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    fn first_value(&self, name: &str) -> Option<&Value> {
        let value = &self.entities.get(name)?.first()?.value;
        match value {
            Value::Object(map) => map.get("value"),
            other => Some(other),
        }
    }

    /// First candidate rendered as text. Numbers, including zero, are values;
    /// null, empty strings and `false` are absence.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.first_value(name)? {
            Value::String(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            }
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(true) => Some("true".to_owned()),
            Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        self.text(name).is_some_and(|value| !value.eq_ignore_ascii_case("false"))
    }

    pub fn intent(&self) -> Option<String> {
        self.text(INTENT)
    }

    pub fn is_trivia_intent(&self) -> bool {
        self.intent().is_some_and(|intent| intent == "trivia")
    }

    /// `None` when no `type` entity was extracted or it names no known category.
    pub fn category(&self) -> Option<Category> {
        self.text(TYPE).and_then(|raw| Category::parse(&raw))
    }

    pub fn wants_random(&self) -> bool {
        self.flag(RANDOM)
    }

    pub fn number(&self) -> Option<Subject> {
        self.text(NUMBER).and_then(|raw| Subject::parse(&raw).ok())
    }

    /// Maps a Wit `/message` response into an entity set.
    ///
    /// Handles the legacy shape (`entities: { intent: [{value}] }`) and the
    /// current one (`intents: [{name}]`, `entities: { "wit$number:number": [...] }`,
    /// `traits: {...}`).
    pub fn from_wit_response(response: &Value) -> Result<Self, NluError> {
        let Some(body) = response.as_object() else {
            return Err(NluError::InvalidResponse("response is not a JSON object".to_owned()));
        };

        let mut set = Self::new();
        for section in ["entities", "traits"] {
            let Some(entries) = body.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (key, candidates) in entries {
                let name = normalize_entity_name(key);
                for candidate in candidates.as_array().into_iter().flatten() {
                    if let Some(value) = candidate.get("value") {
                        set.push(
                            name,
                            EntityCandidate {
                                value: value.clone(),
                                confidence: candidate.get("confidence").and_then(Value::as_f64),
                            },
                        );
                    }
                }
            }
        }

        if !set.entities.contains_key(INTENT) {
            for intent in body.get("intents").and_then(Value::as_array).into_iter().flatten() {
                if let Some(name) = intent.get("name").and_then(Value::as_str) {
                    set.push(
                        INTENT,
                        EntityCandidate {
                            value: Value::String(name.to_owned()),
                            confidence: intent.get("confidence").and_then(Value::as_f64),
                        },
                    );
                }
            }
        }

        Ok(set)
    }
}

fn normalize_entity_name(key: &str) -> &str {
    let name = key.split(':').next().unwrap_or(key);
    name.strip_prefix("wit$").or_else(|| name.strip_prefix("wit/")).unwrap_or(name)
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NluError {
    #[error("nlu request failed: {0}")]
    Transport(String),
    #[error("nlu request timed out")]
    Timeout,
    #[error("nlu service answered with status {0}")]
    Status(u16),
    #[error("nlu response could not be read: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait NluClient: Send + Sync {
    async fn extract(&self, text: &str) -> Result<EntitySet, NluError>;
}
