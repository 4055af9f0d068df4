//! Streaming chat-completion client for a proxy that forwards to OpenAI,
//! Anthropic and Gemini.
//!
//! Raw response bytes go through [`ChunkDecoder`] (UTF-8 safe line framing),
//! [`sse::parse_line`] (SSE `data:` events) and a per-provider payload mapper
//! before reaching the caller as tokens of a [`StreamSession`]. Sessions
//! enforce a per-read inactivity timeout and can be cancelled at any time
//! through their [`AbortHandle`].
//!
//! # Streaming tokens
//!
//! ```no_run
//! use nexuschat_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ChatError> {
//! let client = StreamClient::new(ChatConfig::from_env()?)?;
//! let request = StreamRequest::from_conversation(
//!     Provider::OpenAi,
//!     "gpt-4o-mini",
//!     vec![Message::system("Answer briefly."), Message::user("Say hello")],
//! );
//!
//! let mut session = client.start(request).await?;
//! while let Some(token) = session.next_token().await {
//!     print!("{}", token?);
//! }
//! println!();
//! # Ok(())
//! # }
//! ```

/// Session entry point.
pub mod client;
/// Proxy endpoint settings and model selection.
pub mod config;
/// Byte-to-line decoding of response bodies.
pub mod decoder;
/// Conversation documents answers are streamed into.
pub mod document;
/// Public error types.
pub mod errors;
/// Common imports for typical usage.
pub mod prelude;
/// Provider identifiers and request construction.
pub mod provider;
/// Query orchestration over a conversation document.
pub mod runner;
/// Stream session lifecycle, cancellation and outcomes.
pub mod session;
/// Server-Sent Events line parsing.
pub mod sse;
/// HTTP transport seam.
pub mod transport;
pub(crate) mod vendors;

pub use client::StreamClient;
pub use config::{ChatConfig, ModelSelection};
pub use decoder::ChunkDecoder;
pub use document::{ConversationDocument, TextDocument};
pub use errors::{ChatError, StreamError};
pub use nexuschat_core::{Message, Role};
pub use provider::{PayloadOutcome, PreparedRequest, Provider, StreamRequest};
pub use runner::{ConversationRunner, QueryOutcome};
pub use session::{AbortHandle, SessionState, StreamOutcome, StreamSession};
pub use sse::SseEvent;
pub use transport::{ByteStream, HttpTransport, Transport, TransportResponse};
