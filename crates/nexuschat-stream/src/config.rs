use std::str::FromStr;
use std::time::Duration;

use crate::errors::ChatError;
use crate::provider::Provider;

/// Origin of the proxy that holds the upstream credentials.
pub const DEFAULT_API_BASE: &str = "http://localhost:3000/api";
/// Per-read inactivity window.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Client configuration shared by every session.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Base URL all provider paths are appended to. Provider secrets never
    /// live here: the proxy behind this prefix adds them.
    pub api_base: String,
    /// Maximum wait for the next body chunk before the session fails.
    pub read_timeout: Duration,
    /// Timeout for establishing the HTTP connection.
    pub connect_timeout: Duration,
    /// Bounded token buffer between the session task and its consumer.
    pub token_buffer_capacity: usize,
    /// `max_tokens` sent with Anthropic-shaped requests.
    pub anthropic_max_tokens: u32,
    /// `anthropic-version` header value.
    pub anthropic_version: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: Duration::from_secs(30),
            token_buffer_capacity: 128,
            anthropic_max_tokens: 4096,
            anthropic_version: "2023-06-01".to_string(),
        }
    }
}

impl ChatConfig {
    /// Creates a config with defaults and the given API base.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::default().api_base(api_base)
    }

    /// Builds a config from `NEXUSCHAT_API_BASE`, `NEXUSCHAT_STREAM_TIMEOUT_MS`
    /// and `NEXUSCHAT_ANTHROPIC_MAX_TOKENS`. Unset variables keep defaults.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let mut config = Self::default();
        if let Some(base) = non_empty(lookup("NEXUSCHAT_API_BASE")) {
            config.api_base = base;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "NEXUSCHAT_STREAM_TIMEOUT_MS")? {
            config.read_timeout = Duration::from_millis(ms);
        }
        if let Some(max_tokens) = parse_var::<u32>(&lookup, "NEXUSCHAT_ANTHROPIC_MAX_TOKENS")? {
            config.anthropic_max_tokens = max_tokens;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the API base URL.
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Overrides the per-read inactivity timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the token buffer capacity.
    pub fn token_buffer_capacity(mut self, capacity: usize) -> Self {
        self.token_buffer_capacity = capacity;
        self
    }

    /// Overrides `max_tokens` for Anthropic-shaped requests.
    pub fn anthropic_max_tokens(mut self, max_tokens: u32) -> Self {
        self.anthropic_max_tokens = max_tokens;
        self
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.api_base.trim().is_empty() {
            return Err(ChatError::Config("api_base must not be empty".into()));
        }
        if self.read_timeout.is_zero() {
            return Err(ChatError::Config(
                "read_timeout must be greater than 0".into(),
            ));
        }
        if self.token_buffer_capacity == 0 {
            return Err(ChatError::Config(
                "token_buffer_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Provider and model used for new queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSelection {
    pub provider: Provider,
    pub model: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::for_provider(Provider::Gemini)
    }
}

impl ModelSelection {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Selects a provider with its default model (empty when it has none).
    pub fn for_provider(provider: Provider) -> Self {
        Self::new(provider, provider.default_model().unwrap_or_default())
    }

    /// Reads `NEXUSCHAT_PROVIDER` and `NEXUSCHAT_MODEL`.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let mut selection = match non_empty(lookup("NEXUSCHAT_PROVIDER")) {
            Some(name) => Self::for_provider(name.parse()?),
            None => Self::default(),
        };
        if let Some(model) = non_empty(lookup("NEXUSCHAT_MODEL")) {
            selection.model = model;
        }
        Ok(selection)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ChatError>
where
    T::Err: std::fmt::Display,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ChatError::Config(format!("invalid {key}={raw}: {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ChatConfig::default();
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.token_buffer_capacity, 128);
        assert_eq!(config.anthropic_max_tokens, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = ChatConfig::from_lookup(lookup(&[
            ("NEXUSCHAT_API_BASE", "https://chat.example.com/api/"),
            ("NEXUSCHAT_STREAM_TIMEOUT_MS", "1500"),
            ("NEXUSCHAT_ANTHROPIC_MAX_TOKENS", "1024"),
        ]))
        .expect("config");
        assert_eq!(config.read_timeout, Duration::from_millis(1500));
        assert_eq!(config.anthropic_max_tokens, 1024);
        assert_eq!(
            config.url("/openai/chat/completions"),
            "https://chat.example.com/api/openai/chat/completions"
        );
    }

    #[test]
    fn unparsable_or_zero_timeout_is_config_error() {
        let err = ChatConfig::from_lookup(lookup(&[("NEXUSCHAT_STREAM_TIMEOUT_MS", "soon")]))
            .expect_err("invalid");
        assert!(matches!(err, ChatError::Config(msg) if msg.contains("NEXUSCHAT_STREAM_TIMEOUT_MS")));
        let err = ChatConfig::from_lookup(lookup(&[("NEXUSCHAT_STREAM_TIMEOUT_MS", "0")]))
            .expect_err("zero");
        assert!(matches!(err, ChatError::Config(msg) if msg.contains("read_timeout")));
    }

    #[test]
    fn zero_buffer_capacity_is_rejected() {
        let err = ChatConfig::default()
            .token_buffer_capacity(0)
            .validate()
            .expect_err("zero capacity");
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn model_selection_defaults_to_gemini_pro() {
        let selection = ModelSelection::from_lookup(lookup(&[])).expect("selection");
        assert_eq!(selection, ModelSelection::new(Provider::Gemini, "gemini-pro"));
    }

    #[test]
    fn model_selection_reads_provider_and_model() {
        let selection = ModelSelection::from_lookup(lookup(&[("NEXUSCHAT_PROVIDER", "OpenAI")]))
            .expect("selection");
        assert_eq!(selection, ModelSelection::new(Provider::OpenAi, "gpt-4o-mini"));

        let selection = ModelSelection::from_lookup(lookup(&[
            ("NEXUSCHAT_PROVIDER", "anthropic"),
            ("NEXUSCHAT_MODEL", "claude-3-5-haiku-latest"),
        ]))
        .expect("selection");
        assert_eq!(
            selection,
            ModelSelection::new(Provider::Anthropic, "claude-3-5-haiku-latest")
        );

        assert!(ModelSelection::from_lookup(lookup(&[("NEXUSCHAT_PROVIDER", "bard")])).is_err());
    }
}
