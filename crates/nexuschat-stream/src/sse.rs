//! `data:` line extraction for Server-Sent Events bodies.

/// Payload that marks normal end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// A relevant SSE line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line, trimmed and non-empty.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Extracts the payload of a `data:` line.
///
/// Comments, blank lines, `event:`/`id:` lines and empty payloads yield `None`.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();
    match payload {
        "" => None,
        DONE_SENTINEL => Some(SseEvent::Done),
        _ => Some(SseEvent::Data(payload.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trimmed_payload() {
        assert_eq!(
            parse_line("data: {\"a\":1}  "),
            Some(SseEvent::Data("{\"a\":1}".into()))
        );
        assert_eq!(parse_line("  data:x"), Some(SseEvent::Data("x".into())));
    }

    #[test]
    fn strips_only_the_leading_prefix() {
        assert_eq!(
            parse_line("data: data: nested"),
            Some(SseEvent::Data("data: nested".into()))
        );
    }

    #[test]
    fn recognizes_done_sentinel() {
        assert_eq!(parse_line("data: [DONE]"), Some(SseEvent::Done));
        assert_eq!(parse_line("data:[DONE]\r"), Some(SseEvent::Done));
    }

    #[test]
    fn ignores_other_lines() {
        for line in [
            "",
            ": keep-alive",
            "event: content_block_delta",
            "id: 7",
            "retry: 1000",
            "data:",
            "data:    ",
            "[DONE]",
        ] {
            assert_eq!(parse_line(line), None, "line {line:?}");
        }
    }
}
