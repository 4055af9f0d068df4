use nexuschat_core::conversation::{ANSWER_PREFIX, NEXT_PROMPT, full_reset_text, soft_reset_text};

/// The editable conversation a [`ConversationRunner`](crate::ConversationRunner)
/// reads from and streams answers into.
pub trait ConversationDocument {
    /// Current role-marked text.
    fn text(&self) -> String;
    /// Called once before the first token of an answer.
    fn begin_answer(&mut self);
    /// Called for every token, in order.
    fn push_token(&mut self, token: &str);
    /// Called once when the answer ends, whatever the reason.
    fn end_answer(&mut self);
    /// Clears the conversation but keeps the system prompt.
    fn soft_reset(&mut self);
    /// Clears the conversation back to the default system prompt.
    fn full_reset(&mut self);
}

/// Plain-text document with the caret always at the end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextDocument {
    text: String,
}

impl Default for TextDocument {
    fn default() -> Self {
        Self {
            text: full_reset_text(),
        }
    }
}

impl TextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl ConversationDocument for TextDocument {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn begin_answer(&mut self) {
        self.text.push_str(ANSWER_PREFIX);
    }

    fn push_token(&mut self, token: &str) {
        self.text.push_str(token);
    }

    fn end_answer(&mut self) {
        let trimmed = self.text.trim_end().len();
        self.text.truncate(trimmed);
        self.text.push_str(NEXT_PROMPT);
    }

    fn soft_reset(&mut self) {
        self.text = soft_reset_text(&self.text);
    }

    fn full_reset(&mut self) {
        self.text = full_reset_text();
    }
}
