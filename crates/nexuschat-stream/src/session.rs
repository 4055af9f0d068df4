use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::decoder::ChunkDecoder;
use crate::errors::StreamError;
use crate::provider::{PayloadOutcome, PreparedRequest, Provider};
use crate::sse::{self, SseEvent};
use crate::transport::{ByteStream, Transport, TransportResponse};

/// Lifecycle of a stream session.
///
/// `Idle -> Open -> Streaming -> Closed`, with `Failed` reachable from `Open`
/// and `Streaming` and `Aborted` from any non-terminal state. Terminal states
/// are never left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
    Streaming,
    Closed,
    Aborted,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Aborted | Self::Failed)
    }
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Normal end. `sentinel_seen` is false when the body simply ended
    /// without `[DONE]` or a provider terminal event.
    Completed {
        sentinel_seen: bool,
        tokens: u64,
        skipped_events: u64,
    },
    /// The caller aborted the session.
    Cancelled,
    Failed(StreamError),
}

impl StreamOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Handle used to cancel a session and wait for its teardown.
///
/// Aborting is idempotent. Once aborted, no further tokens are yielded, even
/// ones already buffered; a session that already ended keeps its terminal
/// state.
#[derive(Clone)]
pub struct AbortHandle {
    abort_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<SessionState>,
}

impl AbortHandle {
    /// Requests cancellation of the in-flight exchange.
    pub fn abort(&self) {
        self.abort_tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.abort_tx.borrow()
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Resolves once the session reached a terminal state and released its
    /// response body.
    pub async fn closed(&self) {
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx.wait_for(SessionState::is_terminal).await;
    }
}

/// Lazy token sequence of one request/response exchange.
///
/// Tokens are pulled with [`next_token`](Self::next_token) or through the
/// `futures::Stream` impl. A failure is yielded once as `Err` and ends the
/// sequence; cancellation ends it without an error. Dropping the session
/// cancels it.
pub struct StreamSession {
    session_id: uuid::Uuid,
    provider: Provider,
    rx: mpsc::Receiver<Result<String, StreamError>>,
    outcome_rx: oneshot::Receiver<StreamOutcome>,
    abort_handle: AbortHandle,
}

impl StreamSession {
    pub(crate) fn spawn(
        transport: Arc<dyn Transport>,
        provider: Provider,
        model: String,
        request: PreparedRequest,
        read_timeout: Duration,
        buffer_capacity: usize,
    ) -> Self {
        let session_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(buffer_capacity);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let task = SessionTask {
            session_id,
            provider,
            model,
            transport,
            read_timeout,
            tx,
            abort_rx,
            state_tx,
        };
        tokio::spawn(run_session(task, request, outcome_tx));

        Self {
            session_id,
            provider,
            rx,
            outcome_rx,
            abort_handle: AbortHandle { abort_tx, state_rx },
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn state(&self) -> SessionState {
        self.abort_handle.state()
    }

    /// Returns a handle that can cancel this session from elsewhere.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Cancels the session. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.abort_handle.abort();
    }

    /// Waits for the next token. `None` once the sequence has ended.
    pub async fn next_token(&mut self) -> Option<Result<String, StreamError>> {
        self.next().await
    }

    /// Resolves once the session has been torn down.
    pub async fn closed(&self) {
        self.abort_handle.closed().await;
    }

    /// Discards undelivered tokens and returns how the session ended.
    pub async fn finish(mut self) -> StreamOutcome {
        while self.rx.recv().await.is_some() {}
        match (&mut self.outcome_rx).await {
            Ok(outcome) => outcome,
            Err(_) => StreamOutcome::Failed(StreamError::protocol(format!(
                "session {} ended without an outcome",
                self.session_id
            ))),
        }
    }
}

impl futures::Stream for StreamSession {
    type Item = Result<String, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.abort_handle.is_aborted() {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            // Cancellation wins over tokens that were already buffered.
            Poll::Ready(Some(_)) if this.abort_handle.is_aborted() => Poll::Ready(None),
            other => other,
        }
    }
}

struct SessionTask {
    session_id: uuid::Uuid,
    provider: Provider,
    model: String,
    transport: Arc<dyn Transport>,
    read_timeout: Duration,
    tx: mpsc::Sender<Result<String, StreamError>>,
    abort_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionTask {
    fn transition(&self, next: SessionState) {
        let session_id = self.session_id;
        self.state_tx.send_if_modified(|state| {
            if state.is_terminal() || *state == next {
                return false;
            }
            debug!(%session_id, from = ?state, to = ?next, "session state change");
            *state = next;
            true
        });
    }
}

#[derive(Default)]
struct Counters {
    tokens: u64,
    skipped_events: u64,
}

enum Ended {
    Completed { sentinel_seen: bool },
    Cancelled,
    Failed(StreamError),
}

async fn run_session(
    mut task: SessionTask,
    request: PreparedRequest,
    outcome_tx: oneshot::Sender<StreamOutcome>,
) {
    info!(
        session_id = %task.session_id,
        provider = task.provider.as_str(),
        model = %task.model,
        "starting stream session"
    );
    let mut counters = Counters::default();
    let ended = drive(&mut task, request, &mut counters).await;

    let outcome = match ended {
        Ended::Completed { sentinel_seen } => {
            task.transition(SessionState::Closed);
            info!(
                session_id = %task.session_id,
                sentinel_seen,
                tokens = counters.tokens,
                skipped_events = counters.skipped_events,
                "stream session completed"
            );
            StreamOutcome::Completed {
                sentinel_seen,
                tokens: counters.tokens,
                skipped_events: counters.skipped_events,
            }
        }
        Ended::Cancelled => {
            task.transition(SessionState::Aborted);
            debug!(session_id = %task.session_id, "stream session cancelled");
            StreamOutcome::Cancelled
        }
        Ended::Failed(err) => {
            task.transition(SessionState::Failed);
            warn!(session_id = %task.session_id, error = %err, "stream session failed");
            deliver(&mut task, Err(err.clone())).await;
            StreamOutcome::Failed(err)
        }
    };
    let _ = outcome_tx.send(outcome);
}

async fn drive(task: &mut SessionTask, request: PreparedRequest, counters: &mut Counters) -> Ended {
    task.transition(SessionState::Open);
    let opened = tokio::select! {
        biased;
        _ = cancelled(&mut task.abort_rx, &task.tx) => return Ended::Cancelled,
        opened = task.transport.open(task.provider, request) => opened,
    };

    let mut body = match opened {
        Ok(TransportResponse::Streaming(body)) => body,
        Ok(TransportResponse::Failed { status, body }) => {
            return Ended::Failed(StreamError::Http {
                provider: task.provider,
                status,
                body,
            });
        }
        Err(err) => return Ended::Failed(err),
    };

    task.transition(SessionState::Streaming);
    let ended = pump(task, &mut body, counters).await;
    // Release the connection before the terminal state is published.
    drop(body);
    debug!(session_id = %task.session_id, "response body released");
    ended
}

async fn pump(task: &mut SessionTask, body: &mut ByteStream, counters: &mut Counters) -> Ended {
    let mut decoder = ChunkDecoder::default();
    loop {
        let read = tokio::select! {
            biased;
            _ = cancelled(&mut task.abort_rx, &task.tx) => return Ended::Cancelled,
            read = tokio::time::timeout(task.read_timeout, body.next()) => read,
        };
        let chunk = match read {
            Err(_) => {
                return Ended::Failed(StreamError::Timeout {
                    provider: task.provider,
                    after: task.read_timeout,
                });
            }
            Ok(None) => return Ended::Completed { sentinel_seen: false },
            Ok(Some(Err(err))) => {
                return Ended::Failed(StreamError::transport(
                    task.provider,
                    format!("stream read failed: {err}"),
                ));
            }
            Ok(Some(Ok(chunk))) => chunk,
        };

        for line in decoder.feed(&chunk) {
            let payload = match sse::parse_line(&line) {
                None => continue,
                Some(SseEvent::Done) => return Ended::Completed { sentinel_seen: true },
                Some(SseEvent::Data(payload)) => payload,
            };
            match task.provider.map_payload(&payload) {
                PayloadOutcome::Token(token) => {
                    if !deliver(task, Ok(token)).await {
                        return Ended::Cancelled;
                    }
                    counters.tokens += 1;
                }
                PayloadOutcome::Skip => {}
                PayloadOutcome::Malformed(reason) => {
                    counters.skipped_events += 1;
                    debug!(session_id = %task.session_id, %reason, "skipping malformed event");
                }
                PayloadOutcome::Terminal { final_token } => {
                    if let Some(token) = final_token {
                        if !deliver(task, Ok(token)).await {
                            return Ended::Cancelled;
                        }
                        counters.tokens += 1;
                    }
                    return Ended::Completed { sentinel_seen: true };
                }
            }
        }
    }
}

/// Hands an item to the consumer. Returns false when the session was
/// cancelled or the consumer went away first.
async fn deliver(task: &mut SessionTask, item: Result<String, StreamError>) -> bool {
    tokio::select! {
        biased;
        _ = aborted(&mut task.abort_rx) => false,
        sent = task.tx.send(item) => sent.is_ok(),
    }
}

/// Resolves when cancellation is requested or the consumer dropped the
/// session.
async fn cancelled(
    abort_rx: &mut watch::Receiver<bool>,
    tx: &mpsc::Sender<Result<String, StreamError>>,
) {
    tokio::select! {
        _ = aborted(abort_rx) => {}
        _ = tx.closed() => {}
    }
}

/// Resolves when cancellation is requested or every abort handle is gone.
async fn aborted(abort_rx: &mut watch::Receiver<bool>) {
    loop {
        if *abort_rx.borrow_and_update() {
            return;
        }
        if abort_rx.changed().await.is_err() {
            return;
        }
    }
}
