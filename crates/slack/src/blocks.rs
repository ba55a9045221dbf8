use serde::Serialize;
use triviabot_core::Category;

pub const COMMAND_ACK_TEXT: &str = "Command received :hourglass:";
pub const COMMAND_ERROR_TEXT: &str = "Got an error, can you try again with a valid number?";
pub const CATEGORY_ACTION_PREFIX: &str = "trivia.category.";
pub const THINKING_REACTION: &str = "thinking_face";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// A Slack message: `fallback_text` becomes the top-level `text` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    pub fn text(text: impl Into<String>) -> Self {
        Self { fallback_text: text.into(), blocks: Vec::new() }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section(mut self, block_id: impl Into<String>, text: TextObject) -> Self {
        self.blocks.push(Block::Section { block_id: block_id.into(), text });
        self
    }

    pub fn actions(mut self, block_id: impl Into<String>, elements: Vec<ButtonElement>) -> Self {
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements });
        self
    }

    pub fn context(mut self, block_id: impl Into<String>, elements: Vec<TextObject>) -> Self {
        self.blocks.push(Block::Context { block_id: block_id.into(), elements });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

pub fn command_ack_message() -> MessageTemplate {
    MessageTemplate::text(COMMAND_ACK_TEXT)
}

pub fn command_error_message() -> MessageTemplate {
    MessageTemplate::text(COMMAND_ERROR_TEXT)
}

pub fn fact_message(fact: &str) -> MessageTemplate {
    MessageTemplate::text(fact)
}

pub fn category_action_id(category: Category) -> String {
    format!("{CATEGORY_ACTION_PREFIX}{}", category.as_str())
}

/// Category named by a button's `action_id`, if the button is one of ours.
pub fn category_from_action_id(action_id: &str) -> Option<Category> {
    action_id.strip_prefix(CATEGORY_ACTION_PREFIX).and_then(Category::parse)
}

pub fn category_choice_message(number: &str) -> MessageTemplate {
    let question = format!("What kind of trivia about {number} do you want?");
    let buttons = Category::ALL
        .into_iter()
        .map(|category| {
            let button =
                ButtonElement::new(category_action_id(category), category.label()).value(number);
            if category == Category::General {
                button.style(ButtonStyle::Primary)
            } else {
                button
            }
        })
        .collect();

    MessageBuilder::new(question.clone())
        .section("trivia.choice.question.v1", TextObject::mrkdwn(question))
        .context("trivia.choice.hint.v1", vec![TextObject::plain("Choose the type of trivia")])
        .actions("trivia.choice.actions.v1", buttons)
        .build()
}

pub fn channel_welcome_message(channel_id: &str) -> MessageTemplate {
    MessageTemplate::text(format!("Thank you for inviting me to channel <#{channel_id}>"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use triviabot_core::Category;

    use super::{
        category_choice_message, category_from_action_id, channel_welcome_message,
        command_ack_message, Block,
    };

    #[test]
    fn category_choice_offers_three_buttons_carrying_the_number() {
        let message = category_choice_message("42");
        assert_eq!(message.fallback_text, "What kind of trivia about 42 do you want?");

        let Some(Block::Actions { elements, .. }) = message.blocks.last() else {
            panic!("expected trailing actions block");
        };
        let ids: Vec<_> = elements.iter().map(|button| button.action_id.as_str()).collect();
        assert_eq!(
            ids,
            ["trivia.category.general", "trivia.category.math", "trivia.category.date"]
        );
        assert!(elements.iter().all(|button| button.value.as_deref() == Some("42")));
    }

    #[test]
    fn button_serializes_as_block_kit_button() {
        let message = category_choice_message("7");
        let value = serde_json::to_value(&message.blocks[2]).expect("serialize");
        assert_eq!(value["type"], "actions");
        assert_eq!(
            value["elements"][1],
            json!({
                "type": "button",
                "action_id": "trivia.category.math",
                "text": { "type": "plain_text", "text": "Math" },
                "value": "7"
            })
        );
    }

    #[test]
    fn action_id_round_trips_to_category() {
        assert_eq!(category_from_action_id("trivia.category.date"), Some(Category::Date));
        assert_eq!(category_from_action_id("trivia.category.sports"), None);
        assert_eq!(category_from_action_id("quote.refresh.v1"), None);
    }

    #[test]
    fn fixed_texts_match_bot_copy() {
        assert_eq!(command_ack_message().fallback_text, "Command received :hourglass:");
        assert_eq!(
            channel_welcome_message("C42").fallback_text,
            "Thank you for inviting me to channel <#C42>"
        );
    }
}
