//! Per-provider request shapes and payload mapping.
//!
//! Each vendor module is a pair of pure functions: one building the
//! provider-shaped request, one mapping a single SSE payload to a
//! [`PayloadOutcome`](crate::provider::PayloadOutcome). Dispatch happens on
//! [`Provider`](crate::provider::Provider).
pub(crate) mod anthropic;
pub(crate) mod gemini;
pub(crate) mod openai;

use crate::provider::PayloadOutcome;

fn parse_json(payload: &str) -> Result<serde_json::Value, PayloadOutcome> {
    serde_json::from_str(payload).map_err(|e| PayloadOutcome::Malformed(e.to_string()))
}

fn token_or_skip(text: Option<&str>) -> PayloadOutcome {
    match text {
        Some(text) if !text.is_empty() => PayloadOutcome::Token(text.to_string()),
        _ => PayloadOutcome::Skip,
    }
}
