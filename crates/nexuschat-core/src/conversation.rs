use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// System prompt used when a document carries none of its own.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
/// Text inserted ahead of streamed answer tokens.
pub const ANSWER_PREFIX: &str = "\n\n@ai: ";
/// Fresh user prompt appended once an answer ends.
pub const NEXT_PROMPT: &str = "\n\n@user: ";
/// User input that wipes the conversation instead of being sent.
pub const CLEAR_COMMAND: &str = "clear";

// Markers count only at the start of a line; leading whitespace is allowed.
static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*@(system|user|ai):").expect("role marker pattern is valid")
});

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Maps a document marker name (`system`, `user`, `ai`) to a role.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "ai" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the conversation, serialized as `{role, content}`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Parses a role-marked document into an ordered message list.
///
/// Content runs from the end of one marker to the start of the next (or the
/// end of the text) and is trimmed. Text before the first marker is ignored
/// and markers with no content produce no message.
pub fn parse_conversation(text: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut current: Option<(Role, usize)> = None;

    for captures in MARKER.captures_iter(text) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if let Some((role, start)) = current {
            push_content(&mut messages, role, &text[start..whole.start()]);
        }
        current = Role::from_marker(name.as_str()).map(|role| (role, whole.end()));
    }
    if let Some((role, start)) = current {
        push_content(&mut messages, role, &text[start..]);
    }
    messages
}

fn push_content(messages: &mut Vec<Message>, role: Role, raw: &str) {
    let content = raw.trim();
    if !content.is_empty() {
        messages.push(Message::new(role, content));
    }
}

/// Returns true when the last message is a user `clear` command.
pub fn is_clear_command(messages: &[Message]) -> bool {
    messages.last().is_some_and(|message| {
        message.role == Role::User && message.content.trim().eq_ignore_ascii_case(CLEAR_COMMAND)
    })
}

/// First system prompt in the document, if any.
pub fn system_prompt(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .find(|message| message.role == Role::System)
        .map(|message| message.content.as_str())
}

/// Document reset that keeps the current system prompt.
pub fn soft_reset_text(text: &str) -> String {
    let messages = parse_conversation(text);
    let prompt = system_prompt(&messages).unwrap_or(DEFAULT_SYSTEM_PROMPT);
    starter_document(prompt)
}

/// Document reset back to the default system prompt.
pub fn full_reset_text() -> String {
    starter_document(DEFAULT_SYSTEM_PROMPT)
}

fn starter_document(system_prompt: &str) -> String {
    format!("@system: {system_prompt}{NEXT_PROMPT}")
}
