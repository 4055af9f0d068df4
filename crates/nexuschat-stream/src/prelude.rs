//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, ChatConfig, ChatError, ConversationDocument, ConversationRunner, Message,
    ModelSelection, Provider, QueryOutcome, Role, SessionState, StreamClient, StreamError,
    StreamOutcome, StreamRequest, StreamSession, TextDocument,
};
