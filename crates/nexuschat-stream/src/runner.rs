use nexuschat_core::conversation::{is_clear_command, parse_conversation};
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::StreamClient;
use crate::config::ModelSelection;
use crate::document::ConversationDocument;
use crate::errors::ChatError;
use crate::provider::StreamRequest;
use crate::session::{AbortHandle, StreamOutcome};

/// Result of one [`ConversationRunner::run_query`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The last user turn was `clear`; the document was soft-reset.
    Cleared,
    /// A session ran and ended this way.
    Answered(StreamOutcome),
}

struct CurrentSession {
    id: uuid::Uuid,
    abort: AbortHandle,
}

/// Drives queries from a conversation document, keeping at most one live
/// session. Starting a query or resetting cancels the previous session and
/// waits for it to release its connection first.
pub struct ConversationRunner {
    client: StreamClient,
    selection: ModelSelection,
    current: Mutex<Option<CurrentSession>>,
}

impl ConversationRunner {
    pub fn new(client: StreamClient, selection: ModelSelection) -> Self {
        Self {
            client,
            selection,
            current: Mutex::new(None),
        }
    }

    pub fn selection(&self) -> &ModelSelection {
        &self.selection
    }

    /// Sends the conversation in `document` and streams the answer into it.
    ///
    /// Stream failures are written inline as `[ERROR: ...]` and reported in
    /// the returned outcome; cancellation writes nothing. Validation errors
    /// are returned before the document is touched.
    pub async fn run_query<D>(&self, document: &mut D) -> Result<QueryOutcome, ChatError>
    where
        D: ConversationDocument + Send,
    {
        let messages = parse_conversation(&document.text());
        if is_clear_command(&messages) {
            self.cancel_current().await;
            document.soft_reset();
            return Ok(QueryOutcome::Cleared);
        }

        let request =
            StreamRequest::from_conversation(self.selection.provider, &self.selection.model, messages);
        // Held across teardown, start and install: at most one body is open.
        let mut session = {
            let mut current = self.current.lock().await;
            if let Some(previous) = current.take() {
                teardown(previous).await;
            }
            let session = self.client.start(request).await?;
            *current = Some(CurrentSession {
                id: session.id(),
                abort: session.abort_handle(),
            });
            session
        };
        let session_id = session.id();

        document.begin_answer();
        while let Some(item) = session.next_token().await {
            match item {
                Ok(token) => document.push_token(&token),
                Err(err) => {
                    debug!(%session_id, error = %err, "writing stream failure inline");
                    document.push_token(&format!("[ERROR: {err}]"));
                }
            }
        }
        let outcome = session.finish().await;
        document.end_answer();
        self.release(session_id).await;
        Ok(QueryOutcome::Answered(outcome))
    }

    /// Cancels any in-flight session and resets the document.
    pub async fn reset<D>(&self, document: &mut D, full: bool)
    where
        D: ConversationDocument + Send,
    {
        self.cancel_current().await;
        if full {
            document.full_reset();
        } else {
            document.soft_reset();
        }
    }

    /// Cancels the in-flight session, if any, and waits for its teardown.
    pub async fn cancel_current(&self) {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            teardown(previous).await;
        }
    }

    /// Whether a session is currently registered as in flight.
    pub async fn has_active_session(&self) -> bool {
        self.current.lock().await.is_some()
    }

    async fn release(&self, session_id: uuid::Uuid) {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|c| c.id == session_id) {
            *current = None;
        }
    }
}

async fn teardown(previous: CurrentSession) {
    debug!(session_id = %previous.id, "cancelling in-flight session");
    previous.abort.abort();
    previous.abort.closed().await;
}
