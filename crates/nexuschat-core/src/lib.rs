//! Shared building blocks for NexusChat: the conversation model, the
//! role-marker parser used to turn a plain-text document into a message
//! list, and process-wide logging setup.

/// Role-marked conversation documents and the messages parsed from them.
pub mod conversation;
/// Process-wide tracing subscriber setup.
pub mod observability;

pub use conversation::{Message, Role, parse_conversation};
pub use observability::{LogSettings, init_observability};
