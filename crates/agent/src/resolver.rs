use std::sync::Arc;

use tracing::{debug, warn};
use triviabot_core::{
    ConversationContext, FactLookup, FactPresentation, Subject, TriviaRequest,
};

use crate::nlu::EntitySet;

pub const NOT_UNDERSTOOD_MESSAGE: &str =
    "Sorry, I didn't understand what you want. I'm still just a bot, can you try again?";
pub const LOOKUP_FAILED_MESSAGE: &str = "Sorry, I couldn't process your request";

/// Decides, for one turn, whether the conversation can be answered or needs a
/// subject first.
///
/// States: empty context (awaiting intent), awaiting subject (`category` set,
/// `missing_number`), resolved (`response` set, `done`).
pub struct IntentResolver {
    facts: Arc<dyn FactLookup>,
    presentation: FactPresentation,
}

impl IntentResolver {
    pub fn new(facts: Arc<dyn FactLookup>, presentation: FactPresentation) -> Self {
        Self { facts, presentation }
    }

    pub async fn resolve(
        &self,
        context: &ConversationContext,
        entities: &EntitySet,
    ) -> ConversationContext {
        let category = entities.category().or(context.category).unwrap_or_default();
        let subject =
            if entities.wants_random() { Some(Subject::random()) } else { entities.number() };
        let mut next = context.clone();

        debug!(
            event_name = "agent.resolver.entities",
            entities = ?entities.names().collect::<Vec<_>>(),
            category = category.as_str(),
            subject = subject.as_ref().map(Subject::as_str).unwrap_or("none"),
            "resolving conversation turn"
        );

        if !entities.is_trivia_intent() && subject.is_none() {
            next.response = Some(NOT_UNDERSTOOD_MESSAGE.to_owned());
            next.done = true;
            return next;
        }

        let Some(subject) = subject else {
            next.category = Some(category);
            next.missing_number = true;
            next.response = None;
            return next;
        };

        let request = TriviaRequest::new(subject, category);
        let response = match self.facts.lookup(&request).await {
            Ok(fact) => self.presentation.render(&fact),
            Err(error) => {
                warn!(
                    event_name = "agent.resolver.lookup_failed",
                    path = %request.path(),
                    error = %error,
                    "trivia lookup failed"
                );
                LOOKUP_FAILED_MESSAGE.to_owned()
            }
        };

        next.response = Some(response);
        next.done = true;
        next.missing_number = false;
        next
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use triviabot_core::{
        Category, ConversationContext, FactError, FactLookup, FactPresentation, TriviaRequest,
    };

    use super::{IntentResolver, LOOKUP_FAILED_MESSAGE, NOT_UNDERSTOOD_MESSAGE};
    use crate::nlu::EntitySet;

    #[derive(Default)]
    pub(crate) struct RecordingFacts {
        pub(crate) fail: bool,
        pub(crate) requests: Mutex<Vec<String>>,
    }

    impl RecordingFacts {
        pub(crate) fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }

        pub(crate) fn paths(&self) -> Vec<String> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl FactLookup for RecordingFacts {
        async fn lookup(&self, request: &TriviaRequest) -> Result<String, FactError> {
            self.requests.lock().expect("requests lock").push(request.path());
            if self.fail {
                Err(FactError::Transport("connection refused".to_owned()))
            } else {
                Ok(format!("fact for {}", request.path()))
            }
        }
    }

    fn resolver(facts: Arc<RecordingFacts>, decorate: bool) -> IntentResolver {
        IntentResolver::new(facts, FactPresentation { decorate })
    }

    #[tokio::test]
    async fn unknown_request_terminates_with_not_understood_message() {
        let facts = Arc::new(RecordingFacts::default());
        let resolver = resolver(facts.clone(), true);
        let stored = ConversationContext {
            category: Some(Category::Math),
            missing_number: true,
            ..ConversationContext::default()
        };

        for context in [ConversationContext::default(), stored] {
            for entities in [
                EntitySet::new(),
                EntitySet::new().with("intent", "greeting"),
                EntitySet::new().with("type", "math"),
            ] {
                let next = resolver.resolve(&context, &entities).await;
                assert!(next.done);
                assert_eq!(next.response.as_deref(), Some(NOT_UNDERSTOOD_MESSAGE));
            }
        }
        assert!(facts.paths().is_empty());
    }

    #[tokio::test]
    async fn subject_always_terminates_and_clears_missing_number() {
        let awaiting = ConversationContext {
            category: Some(Category::Date),
            missing_number: true,
            ..ConversationContext::default()
        };
        let entities = EntitySet::new().with("number", "12");

        let ok = resolver(Arc::new(RecordingFacts::default()), false)
            .resolve(&awaiting, &entities)
            .await;
        assert!(ok.done);
        assert!(!ok.missing_number);
        assert_eq!(ok.response.as_deref(), Some("fact for 12/date"));

        let failed = resolver(Arc::new(RecordingFacts::failing()), false)
            .resolve(&awaiting, &entities)
            .await;
        assert!(failed.done);
        assert!(!failed.missing_number);
        assert_eq!(failed.response.as_deref(), Some(LOOKUP_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn intent_without_subject_waits_for_number() {
        let facts = Arc::new(RecordingFacts::default());
        let resolver = resolver(facts.clone(), true);

        let next = resolver
            .resolve(
                &ConversationContext::default(),
                &EntitySet::new().with("intent", "trivia").with("type", "math"),
            )
            .await;

        assert!(!next.done);
        assert!(next.missing_number);
        assert_eq!(next.category, Some(Category::Math));
        assert_eq!(next.response, None);

        let general = resolver
            .resolve(&ConversationContext::default(), &EntitySet::new().with("intent", "trivia"))
            .await;
        assert_eq!(general.category, Some(Category::General));
        assert!(facts.paths().is_empty());
    }

    #[tokio::test]
    async fn stored_category_is_kept_when_no_fresh_type() {
        let facts = Arc::new(RecordingFacts::default());
        let context = ConversationContext {
            category: Some(Category::Math),
            ..ConversationContext::default()
        };

        resolver(facts.clone(), true)
            .resolve(&context, &EntitySet::new().with("intent", "trivia").with("number", "7"))
            .await;

        assert_eq!(facts.paths(), vec!["7/math".to_owned()]);
    }

    #[tokio::test]
    async fn fresh_type_wins_over_stored_category() {
        let facts = Arc::new(RecordingFacts::default());
        let context = ConversationContext {
            category: Some(Category::Math),
            ..ConversationContext::default()
        };

        resolver(facts.clone(), true)
            .resolve(&context, &EntitySet::new().with("type", "date").with("number", "7"))
            .await;

        assert_eq!(facts.paths(), vec!["7/date".to_owned()]);
    }

    #[tokio::test]
    async fn general_type_normalizes_to_empty_category() {
        let facts = Arc::new(RecordingFacts::default());
        let context = ConversationContext {
            category: Some(Category::Math),
            ..ConversationContext::default()
        };

        resolver(facts.clone(), true)
            .resolve(&context, &EntitySet::new().with("type", "general").with("number", "42"))
            .await;

        assert_eq!(facts.paths(), vec!["42/".to_owned()]);
    }

    #[tokio::test]
    async fn random_flag_overrides_explicit_number() {
        let facts = Arc::new(RecordingFacts::default());

        resolver(facts.clone(), true)
            .resolve(
                &ConversationContext::default(),
                &EntitySet::new().with("random", "true").with("number", "5"),
            )
            .await;

        assert_eq!(facts.paths(), vec!["random/".to_owned()]);
    }

    #[tokio::test]
    async fn decorated_fact_uses_pointer_header() {
        let next = resolver(Arc::new(RecordingFacts::default()), true)
            .resolve(
                &ConversationContext::default(),
                &EntitySet::new().with("intent", "trivia").with("number", "42"),
            )
            .await;

        assert_eq!(
            next.response.as_deref(),
            Some("*This is what I found* :point_down:\n_fact for 42/_")
        );
    }
}
