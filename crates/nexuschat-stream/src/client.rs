use std::sync::Arc;

use tracing::debug;

use crate::config::ChatConfig;
use crate::errors::ChatError;
use crate::provider::StreamRequest;
use crate::session::StreamSession;
use crate::transport::{HttpTransport, Transport};

/// Entry point for starting stream sessions against the proxy.
#[derive(Clone)]
pub struct StreamClient {
    transport: Arc<dyn Transport>,
    config: Arc<ChatConfig>,
}

impl StreamClient {
    /// Creates a client that talks HTTP to `config.api_base`.
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let transport = HttpTransport::new(config.clone())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(
        config: ChatConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ChatError> {
        config.validate()?;
        Ok(Self {
            transport,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Validates the request and starts a session for it.
    ///
    /// Nothing is sent when validation fails. HTTP and stream failures are
    /// reported through the returned session.
    pub async fn start(&self, request: StreamRequest) -> Result<StreamSession, ChatError> {
        request.validate()?;
        let prepared = request.provider.build_request(&request, &self.config)?;
        debug!(
            provider = request.provider.as_str(),
            model = %request.model,
            messages = request.messages.len(),
            "stream request prepared"
        );
        Ok(StreamSession::spawn(
            self.transport.clone(),
            request.provider,
            request.model,
            prepared,
            self.config.read_timeout,
            self.config.token_buffer_capacity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::transport::scripted::{ScriptedTransport, chunk};
    use nexuschat_core::Message;

    #[tokio::test]
    async fn invalid_request_is_rejected_before_any_io() {
        let transport = ScriptedTransport::new(vec![]);
        let client =
            StreamClient::with_transport(ChatConfig::default(), transport.clone()).expect("client");

        let result = client
            .start(StreamRequest::new(Provider::OpenAi, "gpt-4o-mini", vec![]))
            .await;

        assert!(matches!(result, Err(ChatError::Validation(_))));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn start_sends_the_provider_shaped_request() {
        let transport = ScriptedTransport::body(vec![chunk("data: [DONE]\n\n")]);
        let client = StreamClient::with_transport(ChatConfig::default(), transport.clone())
            .expect("client");

        let session = client
            .start(StreamRequest::from_conversation(
                Provider::Gemini,
                "",
                vec![Message::user("first"), Message::user("second")],
            ))
            .await
            .expect("start");
        session.closed().await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "gemini/gemini-pro");
        assert_eq!(
            requests[0].body,
            serde_json::json!({"contents": [{"parts": [{"text": "second"}]}]})
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let transport = ScriptedTransport::new(vec![]);
        let config = ChatConfig::default().token_buffer_capacity(0);
        assert!(matches!(
            StreamClient::with_transport(config, transport),
            Err(ChatError::Config(_))
        ));
    }
}
