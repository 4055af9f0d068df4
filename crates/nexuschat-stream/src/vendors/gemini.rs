use crate::errors::ChatError;
use crate::provider::{PayloadOutcome, PreparedRequest, StreamRequest};

use super::{parse_json, token_or_skip};

pub(crate) const DEFAULT_MODEL: &str = "gemini-pro";

/// Sends only the most recent message. Earlier turns are not transmitted to
/// this provider.
pub(crate) fn build_request(request: &StreamRequest) -> Result<PreparedRequest, ChatError> {
    let last = request
        .messages
        .last()
        .ok_or_else(|| ChatError::Validation("at least one message is required".into()))?;
    Ok(PreparedRequest::new(
        format!("gemini/{}", request.model),
        serde_json::json!({
            "contents": [{ "parts": [{ "text": last.content }] }],
        }),
    ))
}

/// Reads `candidates[0].content.parts[0].text`.
pub(crate) fn map_payload(payload: &str) -> PayloadOutcome {
    let value = match parse_json(payload) {
        Ok(value) => value,
        Err(outcome) => return outcome,
    };
    let text = value
        .get("candidates")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get("parts"))
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("text"))
        .and_then(|v| v.as_str());
    token_or_skip(text)
}
