use std::pin::Pin;

use futures::TryStreamExt as _;
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::config::ChatConfig;
use crate::errors::{ChatError, StreamError};
use crate::provider::{PreparedRequest, Provider};

/// Response body as it arrives from the network.
///
/// Dropping the stream releases the underlying connection.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, std::io::Error>> + Send + 'static>>;

/// Result of opening an exchange.
pub enum TransportResponse {
    /// Non-2xx status with the full error body.
    Failed { status: u16, body: String },
    /// 2xx status; the body is read incrementally.
    Streaming(ByteStream),
}

/// Opens one HTTP exchange for a session.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(
        &self,
        provider: Provider,
        request: PreparedRequest,
    ) -> Result<TransportResponse, StreamError>;
}

/// `reqwest`-backed transport posting JSON to `<api_base>/<path>`.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ChatConfig,
}

impl HttpTransport {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        provider: Provider,
        request: PreparedRequest,
    ) -> Result<TransportResponse, StreamError> {
        let url = self.config.url(&request.path);
        debug!(provider = provider.as_str(), %url, "posting stream request");

        let mut http_req = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(&request.body);
        for (name, value) in &request.headers {
            http_req = http_req.header(*name, value);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| StreamError::transport(provider, format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Ok(TransportResponse::Failed {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes_stream().map_err(std::io::Error::other);
        Ok(TransportResponse::Streaming(Box::pin(bytes)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn read_body(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.expect("chunk"));
        }
        out
    }

    fn transport_for(server: &MockServer) -> HttpTransport {
        HttpTransport::new(ChatConfig::new(format!("{}/api", server.uri()))).expect("transport")
    }

    #[tokio::test]
    async fn posts_json_with_headers_and_streams_body() {
        let server = MockServer::start().await;
        let sse = "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Yo\"}}\n\n";
        Mock::given(method("POST"))
            .and(path("/api/anthropic/messages"))
            .and(header("accept", "text/event-stream"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_json(serde_json::json!({"model": "m", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let request = PreparedRequest::new(
            "anthropic/messages",
            serde_json::json!({"model": "m", "stream": true}),
        )
        .header("anthropic-version", "2023-06-01");
        let response = transport_for(&server)
            .open(Provider::Anthropic, request)
            .await
            .expect("open");
        let TransportResponse::Streaming(stream) = response else {
            panic!("expected streaming response");
        };
        assert_eq!(read_body(stream).await, sse.as_bytes());
    }

    #[tokio::test]
    async fn non_success_status_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/openai/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .open(
                Provider::OpenAi,
                PreparedRequest::new("openai/chat/completions", serde_json::json!({})),
            )
            .await
            .expect("open");
        match response {
            TransportResponse::Failed { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized");
            }
            TransportResponse::Streaming(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        let transport =
            HttpTransport::new(ChatConfig::new("http://127.0.0.1:9/api")).expect("transport");
        let err = match transport
            .open(
                Provider::Gemini,
                PreparedRequest::new("gemini/gemini-pro", serde_json::json!({})),
            )
            .await
        {
            Ok(_) => panic!("nothing listens on the discard port"),
            Err(err) => err,
        };
        assert!(matches!(err, StreamError::Transport { provider: Provider::Gemini, .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            HttpTransport::new(ChatConfig::new("  ")),
            Err(ChatError::Config(_))
        ));
    }
}
