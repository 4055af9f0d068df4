use crate::provider::{PayloadOutcome, PreparedRequest, StreamRequest};

use super::{parse_json, token_or_skip};

pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CHAT_COMPLETIONS_PATH: &str = "openai/chat/completions";

pub(crate) fn build_request(request: &StreamRequest) -> PreparedRequest {
    PreparedRequest::new(
        CHAT_COMPLETIONS_PATH,
        serde_json::json!({
            "model": request.model,
            "stream": true,
            "messages": request.messages,
        }),
    )
}

/// Reads `choices[0].delta.content`.
pub(crate) fn map_payload(payload: &str) -> PayloadOutcome {
    let value = match parse_json(payload) {
        Ok(value) => value,
        Err(outcome) => return outcome,
    };
    let content = value
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("delta"))
        .and_then(|v| v.get("content"))
        .and_then(|v| v.as_str());
    token_or_skip(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexuschat_core::Message;

    use crate::provider::Provider;

    #[test]
    fn maps_delta_content_to_token() {
        let outcome = map_payload(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#);
        assert_eq!(outcome, PayloadOutcome::Token("Hi".into()));
    }

    #[test]
    fn missing_or_empty_content_is_skipped() {
        for payload in [
            r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"delta":{"content":""}}]}"#,
            r#"{"choices":[{"delta":{"content":null},"finish_reason":"stop"}]}"#,
            r#"{"choices":[]}"#,
            r#"[1,2,3]"#,
        ] {
            assert_eq!(map_payload(payload), PayloadOutcome::Skip, "payload {payload}");
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(map_payload("not-json"), PayloadOutcome::Malformed(_)));
    }

    #[test]
    fn request_body_streams_full_history() {
        let req = StreamRequest::new(
            Provider::OpenAi,
            "gpt-4o-mini",
            vec![Message::system("sys"), Message::user("hello")],
        );
        let prepared = build_request(&req);
        assert_eq!(prepared.path, "openai/chat/completions");
        assert!(prepared.headers.is_empty());
        assert_eq!(
            prepared.body,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "stream": true,
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hello"},
                ],
            })
        );
    }
}
