use std::fmt;
use std::str::FromStr;

use nexuschat_core::conversation::{Message, Role, system_prompt};

use crate::config::ChatConfig;
use crate::errors::ChatError;
use crate::vendors::{anthropic, gemini, openai};

/// Provider names accepted from configuration. `google` is an alias for Gemini.
pub const ALLOWED_PROVIDERS: [&str; 4] = ["openai", "anthropic", "google", "gemini"];

/// Upstream API shape a request is sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    /// Stable lowercase identifier (used in config and log fields).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Model used when the caller leaves the model name empty.
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some(openai::DEFAULT_MODEL),
            Self::Anthropic => None,
            Self::Gemini => Some(gemini::DEFAULT_MODEL),
        }
    }

    /// Maps one SSE payload to what the session should do with it.
    pub fn map_payload(&self, payload: &str) -> PayloadOutcome {
        match self {
            Self::OpenAi => openai::map_payload(payload),
            Self::Anthropic => anthropic::map_payload(payload),
            Self::Gemini => gemini::map_payload(payload),
        }
    }

    /// Builds the HTTP request for a validated stream request.
    pub fn build_request(
        &self,
        request: &StreamRequest,
        config: &ChatConfig,
    ) -> Result<PreparedRequest, ChatError> {
        match self {
            Self::OpenAi => Ok(openai::build_request(request)),
            Self::Anthropic => Ok(anthropic::build_request(request, config)),
            Self::Gemini => gemini::build_request(request),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Gemini",
        })
    }
}

impl FromStr for Provider {
    type Err = ChatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(ChatError::Validation(format!(
                "unsupported provider: {other} (valid options: {})",
                ALLOWED_PROVIDERS.join(", ")
            ))),
        }
    }
}

/// What a single payload means for the token sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadOutcome {
    /// A non-empty text fragment to hand to the consumer.
    Token(String),
    /// Valid payload that carries no text (role headers, pings, stop events).
    Skip,
    /// Payload was not valid JSON; the reason is only logged.
    Malformed(String),
    /// The upstream signalled the end of the stream inside the body. The
    /// optional token is delivered before the session closes normally.
    Terminal { final_token: Option<String> },
}

/// Everything needed to open one streaming exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
    pub provider: Provider,
    pub model: String,
    pub messages: Vec<Message>,
    /// Only sent to the Anthropic shape, which takes it outside `messages`.
    pub system_prompt: Option<String>,
}

impl StreamRequest {
    /// Creates a request as-is, without defaults or message reshaping.
    pub fn new(provider: Provider, model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            provider,
            model: model.into(),
            messages,
            system_prompt: None,
        }
    }

    /// Creates a request from a parsed conversation.
    ///
    /// An empty model falls back to the provider default. For the Anthropic
    /// shape the first system message becomes `system_prompt` and every
    /// system message is removed from `messages`.
    pub fn from_conversation(provider: Provider, model: &str, messages: Vec<Message>) -> Self {
        let model = match model.trim() {
            "" => provider.default_model().unwrap_or_default().to_string(),
            name => name.to_string(),
        };
        match provider {
            Provider::Anthropic => {
                let system = system_prompt(&messages).map(ToOwned::to_owned);
                let messages = messages
                    .into_iter()
                    .filter(|message| message.role != Role::System)
                    .collect();
                Self {
                    provider,
                    model,
                    messages,
                    system_prompt: system,
                }
            }
            Provider::OpenAi | Provider::Gemini => Self::new(provider, model, messages),
        }
    }

    /// Rejects requests the proxy would refuse anyway.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.model.trim().is_empty() {
            return Err(ChatError::Validation(format!(
                "model must not be empty for provider {}",
                self.provider.as_str()
            )));
        }
        if self.messages.is_empty() {
            return Err(ChatError::Validation(
                "at least one message is required".into(),
            ));
        }
        if self.messages.iter().any(|m| m.content.trim().is_empty()) {
            return Err(ChatError::Validation(
                "message content must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Provider-shaped HTTP request, relative to the configured API base.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedRequest {
    pub path: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: serde_json::Value,
}

impl PreparedRequest {
    pub fn new(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}
