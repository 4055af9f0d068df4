use std::time::Duration;

use crate::provider::Provider;

/// Terminal failure of a stream session.
///
/// Malformed individual events never show up here: they are skipped and
/// counted on the session outcome. Cancellation is not an error either.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The endpoint answered with a non-2xx status. No tokens were produced.
    #[error("{provider} API error: {status} {body}")]
    Http {
        provider: Provider,
        status: u16,
        body: String,
    },
    /// No chunk arrived within the inactivity window.
    #[error("{provider} stream timeout: no data for {} ms", .after.as_millis())]
    Timeout { provider: Provider, after: Duration },
    /// Connecting or reading the response body failed.
    #[error("{provider} transport error: {message}")]
    Transport { provider: Provider, message: String },
    /// The session task ended without reporting a result.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl StreamError {
    pub(crate) fn transport(provider: Provider, message: impl Into<String>) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Top-level error type for the client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Invalid client configuration or environment.
    #[error("config error: {0}")]
    Config(String),
    /// The request was rejected before anything was sent.
    #[error("validation error: {0}")]
    Validation(String),
    /// A started session failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_reads_like_the_inline_marker() {
        let err = StreamError::Http {
            provider: Provider::OpenAi,
            status: 401,
            body: "unauthorized".into(),
        };
        assert_eq!(err.to_string(), "OpenAI API error: 401 unauthorized");
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_timeout());
    }

    #[test]
    fn timeout_reports_window_in_millis() {
        let err = StreamError::Timeout {
            provider: Provider::Gemini,
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Gemini stream timeout: no data for 30000 ms");
        assert!(err.is_timeout());
    }
}
