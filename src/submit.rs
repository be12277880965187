//! Submission controller: one query at a time, cancellable, streaming.
//!
//! Owns the submission state machine
//!
//! ```text
//! Idle ──submit──▶ InFlight ──▶ Completed(text)
//!   ▲                │   └────▶ Failed(error)
//!   └──── cancel ────┘
//! ```
//!
//! and the single-flight invariant: starting a new submission cancels any
//! in-flight read loop and resets to `Idle` in one synchronous sequence
//! before the new loop starts, so "cancel previous, start new" can never
//! race as two independent effects. Cancellation is cooperative — the read
//! loop checks its token between reads and never interrupts a decode.
//!
//! Each parsed frame payload is emitted as a [`QueryEvent::Delta`] the
//! moment it is decoded, so the presentation layer can render the answer
//! incrementally. The contract per submission is still all-or-nothing: a
//! mid-stream failure ends in [`SubmissionState::Failed`] and the partial
//! text is not part of the result.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::error::SubmitError;
use crate::frame::{AnswerAccumulator, FrameParser};
use crate::query::{Query, SessionHandle};
use crate::transport::QueryTransport;

/// Current state of the (at most one) active submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    InFlight,
    Completed(String),
    Failed(SubmitError),
}

/// Incremental progress events for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// One decoded frame payload, emitted as soon as it is parsed.
    Delta(String),
    /// Stream ended cleanly; carries the full accumulated answer.
    Completed(String),
    /// Submission failed; any partial text is discarded from the result.
    Failed(SubmitError),
}

/// Orchestrates query submissions against a [`QueryTransport`].
pub struct SubmissionController {
    transport: Arc<dyn QueryTransport>,
    state: watch::Sender<SubmissionState>,
    cancel: Option<CancellationToken>,
}

impl SubmissionController {
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        SubmissionController {
            transport,
            state,
            cancel: None,
        }
    }

    /// Snapshot of the current submission state.
    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    /// Watch handle for observing state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// Validates and starts a new submission.
    ///
    /// On validation failure the state becomes `Failed` and the error is
    /// returned without any network activity. On success any in-flight
    /// submission is cancelled, its accumulator discarded, and a fresh read
    /// loop started; the returned receiver yields [`QueryEvent`]s ending in
    /// exactly one `Completed` or `Failed` (or nothing more, if this
    /// submission is itself cancelled later).
    pub fn submit(
        &mut self,
        session: Option<&SessionHandle>,
        prompt: &str,
    ) -> Result<mpsc::UnboundedReceiver<QueryEvent>, SubmitError> {
        let query = match Query::build(session, prompt) {
            Ok(query) => query,
            Err(e) => {
                self.state.send_replace(SubmissionState::Failed(e.clone()));
                return Err(e);
            }
        };

        // Single-flight: cancel the previous loop and reset before starting.
        self.cancel();

        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        self.state.send_replace(SubmissionState::InFlight);

        let (events, receiver) = mpsc::unbounded_channel();
        let transport = Arc::clone(&self.transport);
        let state = self.state.clone();
        tokio::spawn(run_read_loop(transport, query, token, state, events));

        Ok(receiver)
    }

    /// Cancels any in-flight submission and forces the state to `Idle`.
    ///
    /// Already-rendered partial text is not retracted, but the cancelled
    /// loop emits no further events or state changes.
    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.state.send_replace(SubmissionState::Idle);
    }
}

impl Drop for SubmissionController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

/// Drives one submission: transport call, frame reassembly, terminal state.
async fn run_read_loop(
    transport: Arc<dyn QueryTransport>,
    query: Query,
    token: CancellationToken,
    state: watch::Sender<SubmissionState>,
    events: mpsc::UnboundedSender<QueryEvent>,
) {
    // Settle a terminal outcome only if this loop was not cancelled; a
    // cancelled loop must leave the state alone (the canceller owns it).
    let settle = |outcome: SubmissionState, event: QueryEvent| {
        if token.is_cancelled() {
            return;
        }
        state.send_replace(outcome);
        let _ = events.send(event);
    };

    let mut stream = tokio::select! {
        _ = token.cancelled() => return,
        result = transport.query(&query) => match result {
            Ok(stream) => stream,
            Err(e) => {
                settle(SubmissionState::Failed(e.clone()), QueryEvent::Failed(e));
                return;
            }
        },
    };

    let mut parser = FrameParser::new();
    let mut answer = AnswerAccumulator::new();

    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => return,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for payload in parser.push(&bytes) {
                    answer.push(&payload);
                    if token.is_cancelled() {
                        return;
                    }
                    let _ = events.send(QueryEvent::Delta(payload));
                }
            }
            Some(Err(e)) => {
                // Mid-stream failure: the partial answer is discarded.
                settle(SubmissionState::Failed(e.clone()), QueryEvent::Failed(e));
                return;
            }
            None => break,
        }
    }

    if let Some(tail) = parser.finish() {
        answer.push(&tail);
        if !token.is_cancelled() {
            let _ = events.send(QueryEvent::Delta(tail));
        }
    }

    let text = answer.into_text();
    settle(
        SubmissionState::Completed(text.clone()),
        QueryEvent::Completed(text),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::transport::QueryStream;
    use async_trait::async_trait;

    /// One scripted transport step: wait, then deliver a chunk or an error.
    #[derive(Clone)]
    struct Step {
        delay: Duration,
        item: Result<&'static [u8], SubmitError>,
    }

    fn chunk(bytes: &'static [u8]) -> Step {
        Step {
            delay: Duration::ZERO,
            item: Ok(bytes),
        }
    }

    fn slow_chunk(bytes: &'static [u8], delay: Duration) -> Step {
        Step {
            delay,
            item: Ok(bytes),
        }
    }

    /// Transport that replays a fixed script per prompt and counts calls.
    struct ScriptedTransport {
        scripts: std::collections::HashMap<String, Vec<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<(&str, Vec<Step>)>) -> Self {
            ScriptedTransport {
                scripts: scripts
                    .into_iter()
                    .map(|(prompt, steps)| (prompt.to_string(), steps))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryTransport for ScriptedTransport {
        async fn query(&self, query: &Query) -> Result<QueryStream, SubmitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let steps = self
                .scripts
                .get(&query.prompt)
                .cloned()
                .unwrap_or_else(|| panic!("no script for prompt '{}'", query.prompt));
            let stream = futures::stream::unfold(steps.into_iter(), |mut steps| async move {
                let step = steps.next()?;
                tokio::time::sleep(step.delay).await;
                Some((step.item.map(Bytes::from_static), steps))
            });
            Ok(Box::pin(stream))
        }
    }

    /// Failing transport for validation tests — must never be called.
    struct UnreachableTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryTransport for UnreachableTransport {
        async fn query(&self, _query: &Query) -> Result<QueryStream, SubmitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SubmitError::Network("should not be reached".to_string()))
        }
    }

    /// Drains events until a terminal one, returning everything received.
    async fn collect_events(mut rx: mpsc::UnboundedReceiver<QueryEvent>) -> Vec<QueryEvent> {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = matches!(event, QueryEvent::Completed(_) | QueryEvent::Failed(_));
            out.push(event);
            if terminal {
                break;
            }
        }
        out
    }

    #[tokio::test]
    async fn test_no_session_never_touches_transport() {
        let transport = Arc::new(UnreachableTransport {
            calls: AtomicUsize::new(0),
        });
        let mut controller = SubmissionController::new(transport.clone());

        let err = controller.submit(None, "hi").unwrap_err();
        assert_eq!(err, SubmitError::NoSession);
        assert_eq!(
            controller.state(),
            SubmissionState::Failed(SubmitError::NoSession)
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_prompt_never_touches_transport() {
        let transport = Arc::new(UnreachableTransport {
            calls: AtomicUsize::new(0),
        });
        let mut controller = SubmissionController::new(transport.clone());
        let session = SessionHandle::new("s1");

        let err = controller.submit(Some(&session), "   ").unwrap_err();
        assert_eq!(err, SubmitError::EmptyPrompt);
        assert_eq!(
            controller.state(),
            SubmissionState::Failed(SubmitError::EmptyPrompt)
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_success_across_odd_chunks() {
        // Three data lines fragmented without regard for line boundaries.
        let transport = Arc::new(ScriptedTransport::new(vec![(
            "hi",
            vec![
                chunk(b"data: Hel\nda"),
                chunk(b"ta: lo, \ndata: wor"),
                chunk(b"ld\n"),
            ],
        )]));
        let mut controller = SubmissionController::new(transport.clone());
        let session = SessionHandle::new("s1");

        let rx = controller.submit(Some(&session), "hi").unwrap();
        assert_eq!(controller.state(), SubmissionState::InFlight);

        let events = collect_events(rx).await;
        assert_eq!(
            events.last(),
            Some(&QueryEvent::Completed("Hello, world".to_string()))
        );
        let deltas: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                QueryEvent::Delta(d) => Some(d.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["Hel", "lo, ", "world"]);
        assert_eq!(
            controller.state(),
            SubmissionState::Completed("Hello, world".to_string())
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_unterminated_final_frame_flushed() {
        let transport = Arc::new(ScriptedTransport::new(vec![(
            "hi",
            vec![chunk(b"data: part one\ndata: part two")],
        )]));
        let mut controller = SubmissionController::new(transport);
        let session = SessionHandle::new("s1");

        let rx = controller.submit(Some(&session), "hi").unwrap();
        let events = collect_events(rx).await;
        assert_eq!(
            events.last(),
            Some(&QueryEvent::Completed("part onepart two".to_string()))
        );
    }

    #[tokio::test]
    async fn test_backend_error_fails_submission() {
        struct BackendErrorTransport;
        #[async_trait]
        impl QueryTransport for BackendErrorTransport {
            async fn query(&self, _query: &Query) -> Result<QueryStream, SubmitError> {
                Err(SubmitError::Backend("Session does not exist".to_string()))
            }
        }

        let mut controller = SubmissionController::new(Arc::new(BackendErrorTransport));
        let session = SessionHandle::new("gone");

        let rx = controller.submit(Some(&session), "hi").unwrap();
        let events = collect_events(rx).await;
        let expected = SubmitError::Backend("Session does not exist".to_string());
        assert_eq!(events, vec![QueryEvent::Failed(expected.clone())]);
        assert_eq!(controller.state(), SubmissionState::Failed(expected));
    }

    #[tokio::test]
    async fn test_mid_stream_error_discards_partial_answer() {
        let transport = Arc::new(ScriptedTransport::new(vec![(
            "hi",
            vec![
                chunk(b"data: partial text\n"),
                Step {
                    delay: Duration::ZERO,
                    item: Err(SubmitError::Network("connection reset".to_string())),
                },
            ],
        )]));
        let mut controller = SubmissionController::new(transport);
        let session = SessionHandle::new("s1");

        let rx = controller.submit(Some(&session), "hi").unwrap();
        let events = collect_events(rx).await;

        // The delta was rendered transiently, but the terminal state is a
        // failure with no partial answer.
        let expected = SubmitError::Network("connection reset".to_string());
        assert_eq!(
            events.last(),
            Some(&QueryEvent::Failed(expected.clone()))
        );
        assert_eq!(controller.state(), SubmissionState::Failed(expected));
    }

    #[tokio::test]
    async fn test_single_flight_second_submit_wins() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            (
                "first",
                vec![
                    chunk(b"data: old-"),
                    slow_chunk(b"data: never\n", Duration::from_secs(30)),
                ],
            ),
            ("second", vec![chunk(b"data: fresh answer\n")]),
        ]));
        let mut controller = SubmissionController::new(transport.clone());
        let session = SessionHandle::new("s1");

        let mut rx1 = controller.submit(Some(&session), "first").unwrap();
        // Let the first read loop actually start streaming.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.state(), SubmissionState::InFlight);

        let rx2 = controller.submit(Some(&session), "second").unwrap();
        let events = collect_events(rx2).await;
        assert_eq!(
            events.last(),
            Some(&QueryEvent::Completed("fresh answer".to_string()))
        );

        // Only the second submission's answer survives; the first loop was
        // cancelled and emits no terminal event.
        assert_eq!(
            controller.state(),
            SubmissionState::Completed("fresh answer".to_string())
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        loop {
            match rx1.try_recv() {
                Ok(QueryEvent::Delta(_)) => continue,
                Ok(other) => panic!("cancelled submission emitted {:?}", other),
                Err(_) => break,
            }
        }
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancel_forces_idle() {
        let transport = Arc::new(ScriptedTransport::new(vec![(
            "hi",
            vec![slow_chunk(b"data: slow\n", Duration::from_secs(30))],
        )]));
        let mut controller = SubmissionController::new(transport);
        let session = SessionHandle::new("s1");

        let _rx = controller.submit(Some(&session), "hi").unwrap();
        assert_eq!(controller.state(), SubmissionState::InFlight);

        controller.cancel();
        assert_eq!(controller.state(), SubmissionState::Idle);

        // The cancelled loop must not resurrect a terminal state.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.state(), SubmissionState::Idle);
    }
}
