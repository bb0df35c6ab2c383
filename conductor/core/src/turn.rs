//! Turns and the Turn Executor
//!
//! A [`Turn`] is one agent's single response. The [`TurnExecutor`] owns a turn
//! from the moment the request is opened until it reaches a terminal status:
//!
//! - `Completed`: the reply is appended to the history and folded into metrics
//! - `Failed`: the error is tallied, partial content is kept on the turn, the
//!   run carries on
//! - `Aborted`: cancellation was observed; nothing is persisted
//!
//! Metrics and history are only touched once the outcome is known, so an
//! aborted turn leaves both exactly as they were before it began.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::{ChatBackend, ChatRequest};
use crate::config::RunConfig;
use crate::messages::ConductorMessage;
use crate::metrics::{ErrorCategory, Metrics};
use crate::session::ConversationHistory;
use crate::streaming::{DecodeError, StreamDecoder, StreamEvent};

/// Text shown in place of a failed turn's reply
pub const FAILED_PLACEHOLDER: &str = "Error generating response";

/// One of the two fixed participants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// Opens every round
    #[serde(rename = "AI1")]
    AgentA,
    /// Answers agent A
    #[serde(rename = "AI2")]
    AgentB,
}

impl Speaker {
    /// Short label used in transcripts
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AgentA => "AI1",
            Self::AgentB => "AI2",
        }
    }

    /// The other participant
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::AgentA => Self::AgentB,
            Self::AgentB => Self::AgentA,
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// Deltas are still arriving
    Streaming,
    /// The stream ended normally
    Completed,
    /// Cancellation was observed
    Aborted,
    /// The request or the stream failed
    Failed,
}

impl TurnStatus {
    /// Whether the turn can no longer change
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Streaming)
    }
}

/// One agent's single response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who is speaking
    pub speaker: Speaker,
    /// The prompt being answered
    pub prompt: String,
    /// Accumulated reply text
    pub content: String,
    /// Current status
    pub status: TurnStatus,
    /// When the request was opened
    pub started_at: DateTime<Utc>,
    /// When the turn reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall time from request to terminal status
    pub elapsed_seconds: f64,
    /// Words in the final content
    pub word_count: usize,
    /// Why a failed turn failed
    pub error: Option<ErrorCategory>,
}

impl Turn {
    /// Start a turn in the `Streaming` state
    pub fn begin(speaker: Speaker, prompt: impl Into<String>) -> Self {
        Self {
            speaker,
            prompt: prompt.into(),
            content: String::new(),
            status: TurnStatus::Streaming,
            started_at: Utc::now(),
            completed_at: None,
            elapsed_seconds: 0.0,
            word_count: 0,
            error: None,
        }
    }

    /// Move to a terminal status and freeze the derived fields
    pub fn finish(&mut self, status: TurnStatus, elapsed_seconds: f64) {
        if self.status.is_terminal() {
            tracing::warn!(speaker = %self.speaker, status = ?self.status, "Turn already finished");
            return;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        self.elapsed_seconds = elapsed_seconds;
        self.word_count = word_count(&self.content);
    }

    /// Token estimate used by the metrics
    #[must_use]
    pub fn estimated_tokens(&self) -> f64 {
        self.word_count as f64 * crate::metrics::TOKENS_PER_WORD
    }

    /// What the message list shows for this turn
    #[must_use]
    pub fn display_content(&self) -> &str {
        match self.status {
            TurnStatus::Failed => FAILED_PLACEHOLDER,
            _ => &self.content,
        }
    }
}

/// Count whitespace-separated words
///
/// Empty or blank text counts as one (empty) word.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count().max(1)
}

/// Split a comma-separated stop list, trimming entries and dropping empties
#[must_use]
pub fn parse_stop_sequences(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Build the wire request for one turn
#[must_use]
pub fn build_request(
    speaker: Speaker,
    prompt: &str,
    config: &RunConfig,
    history: &ConversationHistory,
) -> ChatRequest {
    let sampling = &config.sampling;
    ChatRequest {
        model: config.model_for(speaker).to_string(),
        temperature: sampling.temperature,
        max_tokens: sampling.max_tokens,
        frequency_penalty: sampling.frequency_penalty,
        presence_penalty: sampling.presence_penalty,
        top_p: sampling.top_p,
        stop: parse_stop_sequences(&sampling.stop_sequences),
        messages: history.request_messages(config.context_for(speaker), prompt),
        stream: true,
    }
}

/// Runs single turns against a backend
pub struct TurnExecutor<B: ChatBackend> {
    backend: Arc<B>,
    tx: mpsc::Sender<ConductorMessage>,
}

impl<B: ChatBackend> TurnExecutor<B> {
    /// Create an executor that reports progress on `tx`
    pub fn new(backend: Arc<B>, tx: mpsc::Sender<ConductorMessage>) -> Self {
        Self { backend, tx }
    }

    /// The backend turns are sent to
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Execute one turn to a terminal status
    ///
    /// Never fails: every outcome is encoded in the returned turn's status.
    pub async fn execute_turn(
        &self,
        speaker: Speaker,
        prompt: &str,
        config: &RunConfig,
        history: &mut ConversationHistory,
        metrics: &mut Metrics,
        cancel: &CancellationToken,
    ) -> Turn {
        let mut turn = Turn::begin(speaker, prompt);
        let clock = Instant::now();
        let mut malformed = 0u64;

        let outcome = if cancel.is_cancelled() {
            Err(DecodeError::Cancelled)
        } else {
            let request = build_request(speaker, prompt, config, history);
            tracing::debug!(
                %speaker,
                model = %request.model,
                history_len = history.len(),
                "Opening stream"
            );
            self.stream_reply(&mut turn, &request, &mut malformed, cancel)
                .await
        };

        let elapsed = clock.elapsed().as_secs_f64();

        match outcome {
            Ok(()) => {
                turn.finish(TurnStatus::Completed, elapsed);
                for _ in 0..malformed {
                    metrics.record_error(ErrorCategory::Api);
                }
                history.append_exchange(prompt, turn.content.clone());
                metrics.record(&turn);
                tracing::info!(
                    %speaker,
                    elapsed_secs = elapsed,
                    words = turn.word_count,
                    "Turn completed"
                );
            }
            Err(DecodeError::Cancelled) => {
                turn.finish(TurnStatus::Aborted, elapsed);
                tracing::info!(%speaker, "Turn aborted");
            }
            Err(DecodeError::Source(e)) => {
                let category = e.category();
                turn.error = Some(category);
                turn.finish(TurnStatus::Failed, elapsed);
                for _ in 0..malformed {
                    metrics.record_error(ErrorCategory::Api);
                }
                metrics.record_error(category);
                tracing::warn!(%speaker, %category, error = %e, "Turn failed");
            }
        }

        turn
    }

    /// Open the request and drain the decoder into `turn.content`
    ///
    /// The decoder (and with it the connection) is dropped on every return path.
    async fn stream_reply(
        &self,
        turn: &mut Turn,
        request: &ChatRequest,
        malformed: &mut u64,
        cancel: &CancellationToken,
    ) -> Result<(), DecodeError> {
        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DecodeError::Cancelled),
            body = self.backend.open_stream(request) => body?,
        };

        let mut decoder = StreamDecoder::new(body, cancel.clone());
        while let Some(event) = decoder.next_event().await {
            match event? {
                StreamEvent::Delta(text) => {
                    turn.content.push_str(&text);
                    self.publish_progress(ConductorMessage::Progress {
                        speaker: turn.speaker,
                        partial_content: turn.content.clone(),
                    });
                }
                StreamEvent::Malformed(raw) => {
                    *malformed += 1;
                    tracing::warn!(
                        speaker = %turn.speaker,
                        record = %raw,
                        "Malformed stream record"
                    );
                }
                StreamEvent::StreamEnd => break,
            }
        }

        Ok(())
    }

    /// Progress carries the full text so far, so a dropped update is
    /// superseded by the next one. Never waits on the surface.
    fn publish_progress(&self, msg: ConductorMessage) {
        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("Surface is behind, dropping progress update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Surface closed, dropping progress update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, ByteStream};
    use crate::session::ChatRole;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::time::Duration;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    enum Script {
        Body(Vec<&'static str>),
        Fail(BackendError),
        FailMidway(Vec<&'static str>, BackendError),
        /// Sends `parts`, then the connection stays open with nothing more
        Stall(Vec<&'static str>),
        Hang,
    }

    struct ScriptedBackend {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    fn chunks(parts: Vec<&'static str>) -> Vec<Result<Bytes, BackendError>> {
        parts
            .into_iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect()
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, BackendError> {
            self.requests.lock().push(request.clone());
            let script = self.scripts.lock().pop_front().unwrap_or(Script::Hang);
            match script {
                Script::Body(parts) => Ok(Box::pin(futures::stream::iter(chunks(parts)))),
                Script::Fail(e) => Err(e),
                Script::FailMidway(parts, e) => {
                    let mut items = chunks(parts);
                    items.push(Err(e));
                    Ok(Box::pin(futures::stream::iter(items)))
                }
                Script::Stall(parts) => Ok(Box::pin(
                    futures::stream::iter(chunks(parts))
                        .chain(futures::stream::pending::<Result<Bytes, BackendError>>()),
                )),
                Script::Hang => Ok(Box::pin(
                    futures::stream::pending::<Result<Bytes, BackendError>>(),
                )),
            }
        }
    }

    fn executor(
        scripts: Vec<Script>,
    ) -> (TurnExecutor<ScriptedBackend>, mpsc::Receiver<ConductorMessage>) {
        executor_with_capacity(scripts, 64)
    }

    fn executor_with_capacity(
        scripts: Vec<Script>,
        capacity: usize,
    ) -> (TurnExecutor<ScriptedBackend>, mpsc::Receiver<ConductorMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (TurnExecutor::new(Arc::new(ScriptedBackend::new(scripts)), tx), rx)
    }

    const HELLO: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
        "data: [DONE]\n",
    );

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("Hello"), 1);
        assert_eq!(word_count("Hi there friend"), 3);
        assert_eq!(word_count("  spaced \n\t out  "), 2);
        assert_eq!(word_count(""), 1);
        assert_eq!(word_count("   "), 1);
    }

    #[test]
    fn test_parse_stop_sequences() {
        assert_eq!(parse_stop_sequences(" END, STOP ,, ,x"), vec!["END", "STOP", "x"]);
        assert!(parse_stop_sequences("").is_empty());
        assert!(parse_stop_sequences(" , ").is_empty());
    }

    #[test]
    fn test_speaker_labels() {
        assert_eq!(Speaker::AgentA.label(), "AI1");
        assert_eq!(Speaker::AgentB.to_string(), "AI2");
        assert_eq!(Speaker::AgentA.other(), Speaker::AgentB);
        assert_eq!(serde_json::to_string(&Speaker::AgentB).unwrap(), "\"AI2\"");
    }

    #[test]
    fn test_build_request_uses_speaker_settings() {
        let mut config = RunConfig::default();
        config.model_b = "b/model".to_string();
        config.context_b = "Be contrary.".to_string();
        config.sampling.stop_sequences = "END, STOP".to_string();

        let mut history = ConversationHistory::new();
        history.append_exchange("Hi!", "Hello.");

        let request = build_request(Speaker::AgentB, "Hello.", &config, &history);
        assert_eq!(request.model, "b/model");
        assert_eq!(request.stop, vec!["END", "STOP"]);
        assert!(request.stream);
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(request.messages[0].content, "Be contrary.");
        assert_eq!(request.messages[3].content, "Hello.");
    }

    #[test]
    fn test_finish_is_final() {
        let mut turn = Turn::begin(Speaker::AgentA, "Hi!");
        turn.content = "done".to_string();
        turn.finish(TurnStatus::Completed, 1.0);
        turn.finish(TurnStatus::Failed, 2.0);
        assert_eq!(turn.status, TurnStatus::Completed);
        assert_eq!(turn.elapsed_seconds, 1.0);
        assert!(turn.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_completed_turn_updates_history_and_metrics() {
        let (executor, mut rx) = executor(vec![Script::Body(vec![HELLO])]);
        let mut history = ConversationHistory::new();
        let mut metrics = Metrics::new();

        let turn = executor
            .execute_turn(
                Speaker::AgentA,
                "Hi!",
                &RunConfig::default(),
                &mut history,
                &mut metrics,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(turn.status, TurnStatus::Completed);
        assert_eq!(turn.content, "Hello");
        assert_eq!(turn.word_count, 1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[1].content, "Hello");
        assert_eq!(metrics.word_counts, vec![1]);

        let mut partials = Vec::new();
        while let Ok(ConductorMessage::Progress { partial_content, .. }) = rx.try_recv() {
            partials.push(partial_content);
        }
        assert_eq!(partials, vec!["Hel".to_string(), "Hello".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_records_counted_as_api_errors() {
        let (executor, _rx) = executor(vec![Script::Body(vec![
            "data: nope\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\ndata: {bad\n",
        ])]);
        let mut history = ConversationHistory::new();
        let mut metrics = Metrics::new();

        let turn = executor
            .execute_turn(
                Speaker::AgentA,
                "Hi!",
                &RunConfig::default(),
                &mut history,
                &mut metrics,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(turn.status, TurnStatus::Completed);
        assert_eq!(turn.content, "ok");
        assert_eq!(metrics.error_counts.api, 2);
    }

    #[tokio::test]
    async fn test_network_failure_classified() {
        let (executor, _rx) = executor(vec![
            Script::Fail(BackendError::Timeout("deadline".to_string())),
            Script::FailMidway(
                vec!["data: {\"choices\":[{\"delta\":{\"content\":\"part\"}}]}\n"],
                BackendError::Body("reset".to_string()),
            ),
        ]);
        let mut history = ConversationHistory::new();
        let mut metrics = Metrics::new();
        let config = RunConfig::default();
        let cancel = CancellationToken::new();

        let timed_out = executor
            .execute_turn(Speaker::AgentA, "Hi!", &config, &mut history, &mut metrics, &cancel)
            .await;
        assert_eq!(timed_out.status, TurnStatus::Failed);
        assert_eq!(timed_out.error, Some(ErrorCategory::Timeout));
        assert_eq!(timed_out.display_content(), FAILED_PLACEHOLDER);

        let broken = executor
            .execute_turn(Speaker::AgentB, "Hi!", &config, &mut history, &mut metrics, &cancel)
            .await;
        assert_eq!(broken.status, TurnStatus::Failed);
        assert_eq!(broken.content, "part");
        assert_eq!(broken.error, Some(ErrorCategory::Other));

        assert!(history.is_empty());
        assert!(metrics.response_times.is_empty());
        assert_eq!(metrics.error_counts.timeout, 1);
        assert_eq!(metrics.error_counts.other, 1);
    }

    #[tokio::test]
    async fn test_precancelled_turn_never_opens_request() {
        let (executor, _rx) = executor(vec![Script::Body(vec![HELLO])]);
        let mut history = ConversationHistory::new();
        let mut metrics = Metrics::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let turn = executor
            .execute_turn(
                Speaker::AgentA,
                "Hi!",
                &RunConfig::default(),
                &mut history,
                &mut metrics,
                &cancel,
            )
            .await;

        assert_eq!(turn.status, TurnStatus::Aborted);
        assert!(executor.backend().requests.lock().is_empty());
        assert!(history.is_empty());
        assert_eq!(metrics, Metrics::default());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_leaves_state_untouched() {
        let (executor, _rx) = executor(vec![Script::Hang]);
        let mut history = ConversationHistory::new();
        history.append_exchange("earlier", "reply");
        let mut metrics = Metrics::new();
        metrics.record_error(ErrorCategory::Other);
        let before = (history.clone(), metrics.clone());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        let turn = executor
            .execute_turn(
                Speaker::AgentB,
                "Hi!",
                &RunConfig::default(),
                &mut history,
                &mut metrics,
                &cancel,
            )
            .await;

        assert_eq!(turn.status, TurnStatus::Aborted);
        assert_eq!((history, metrics), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_malformed_record_leaves_state_untouched() {
        let (executor, _rx) = executor(vec![Script::Stall(vec![
            "data: nope\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"part\"}}]}\n",
        ])]);
        let mut history = ConversationHistory::new();
        let mut metrics = Metrics::new();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let turn = executor
            .execute_turn(
                Speaker::AgentA,
                "Hi!",
                &RunConfig::default(),
                &mut history,
                &mut metrics,
                &cancel,
            )
            .await;

        assert_eq!(turn.status, TurnStatus::Aborted);
        assert_eq!(turn.content, "part");
        assert!(history.is_empty());
        assert_eq!(metrics.error_counts.api, 0);
        assert_eq!(metrics, Metrics::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_surface_does_not_delay_cancellation() {
        // Capacity 1 and a receiver that is never read: the second update finds it full
        let (executor, _rx) = executor_with_capacity(
            vec![Script::Stall(vec![
                "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n",
            ])],
            1,
        );
        let mut history = ConversationHistory::new();
        let mut metrics = Metrics::new();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let turn = tokio::time::timeout(
            Duration::from_secs(2),
            executor.execute_turn(
                Speaker::AgentB,
                "Hi!",
                &RunConfig::default(),
                &mut history,
                &mut metrics,
                &cancel,
            ),
        )
        .await
        .expect("turn should end once cancelled");

        assert_eq!(turn.status, TurnStatus::Aborted);
        assert_eq!(turn.content, "abc");
        assert!(history.is_empty());
    }
}
