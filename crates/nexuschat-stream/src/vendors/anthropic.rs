use tracing::warn;

use crate::config::ChatConfig;
use crate::provider::{PayloadOutcome, PreparedRequest, StreamRequest};

use super::{parse_json, token_or_skip};

const MESSAGES_PATH: &str = "anthropic/messages";
const VERSION_HEADER: &str = "anthropic-version";

pub(crate) fn build_request(request: &StreamRequest, config: &ChatConfig) -> PreparedRequest {
    let mut body = serde_json::json!({
        "model": request.model,
        "messages": request.messages,
        "stream": true,
        "max_tokens": config.anthropic_max_tokens,
    });
    if let Some(system) = request.system_prompt.as_ref() {
        body["system"] = serde_json::Value::String(system.clone());
    }
    PreparedRequest::new(MESSAGES_PATH, body).header(VERSION_HEADER, &config.anthropic_version)
}

/// Text comes only from `content_block_delta` events. An `error` event ends
/// the stream after one inline `[ERROR: ...]` token.
pub(crate) fn map_payload(payload: &str) -> PayloadOutcome {
    let value = match parse_json(payload) {
        Ok(value) => value,
        Err(outcome) => return outcome,
    };
    match value.get("type").and_then(|v| v.as_str()) {
        Some("content_block_delta") => token_or_skip(
            value
                .get("delta")
                .and_then(|d| d.get("text"))
                .and_then(|v| v.as_str()),
        ),
        Some("error") => {
            let message = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            warn!(error = message, "Anthropic stream reported an error");
            PayloadOutcome::Terminal {
                final_token: Some(format!("[ERROR: {message}]")),
            }
        }
        _ => PayloadOutcome::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexuschat_core::Message;

    use crate::provider::Provider;

    #[test]
    fn maps_content_block_delta() {
        let outcome = map_payload(r#"{"type":"content_block_delta","delta":{"text":"Yo"}}"#);
        assert_eq!(outcome, PayloadOutcome::Token("Yo".into()));
    }

    #[test]
    fn error_event_becomes_terminal_inline_token() {
        let outcome = map_payload(r#"{"type":"error","error":{"message":"boom"}}"#);
        assert_eq!(
            outcome,
            PayloadOutcome::Terminal {
                final_token: Some("[ERROR: boom]".into())
            }
        );
    }

    #[test]
    fn error_event_without_message_still_terminates() {
        let outcome = map_payload(r#"{"type":"error"}"#);
        assert_eq!(
            outcome,
            PayloadOutcome::Terminal {
                final_token: Some("[ERROR: unknown error]".into())
            }
        );
    }

    #[test]
    fn other_event_types_are_skipped() {
        for payload in [
            r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
            r#"{"type":"content_block_start","index":0}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"message_stop"}"#,
            r#"{"delta":{"text":"untyped"}}"#,
        ] {
            assert_eq!(map_payload(payload), PayloadOutcome::Skip, "payload {payload}");
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(map_payload("{\"type\":"), PayloadOutcome::Malformed(_)));
    }

    #[test]
    fn request_carries_system_max_tokens_and_version() {
        let req = StreamRequest::from_conversation(
            Provider::Anthropic,
            "claude-3-haiku",
            vec![Message::system("Be brief."), Message::user("Hi")],
        );
        let prepared = build_request(&req, &ChatConfig::default());
        assert_eq!(prepared.path, "anthropic/messages");
        assert_eq!(
            prepared.headers,
            vec![("anthropic-version", "2023-06-01".to_string())]
        );
        assert_eq!(
            prepared.body,
            serde_json::json!({
                "model": "claude-3-haiku",
                "system": "Be brief.",
                "messages": [{"role": "user", "content": "Hi"}],
                "stream": true,
                "max_tokens": 4096,
            })
        );
    }

    #[test]
    fn system_field_is_omitted_without_a_prompt() {
        let req = StreamRequest::from_conversation(
            Provider::Anthropic,
            "claude-3-haiku",
            vec![Message::user("Hi")],
        );
        let prepared = build_request(&req, &ChatConfig::default().anthropic_max_tokens(512));
        assert!(prepared.body.get("system").is_none());
        assert_eq!(prepared.body["max_tokens"], serde_json::json!(512));
    }
}
