//! Stream Decoder
//!
//! Turns the raw body of a streaming chat-completion response into decoded
//! protocol events. The body is a sequence of newline-delimited records; only
//! records starting with `data: ` matter. Their payload is either a JSON
//! envelope carrying an incremental text fragment at
//! `choices[0].delta.content`, or the sentinel `[DONE]`.
//!
//! Transport reads carry no framing guarantees: one read may hold half a
//! record, several records, or split a multi-byte character. [`RecordDecoder`]
//! buffers raw bytes and only decodes complete lines, so the decoded events
//! are identical however the body was chunked.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, ByteStream};

/// Prefix marking a significant record
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Payload marking normal end of stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// A decoded protocol event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text fragment
    Delta(String),
    /// The sentinel was received
    StreamEnd,
    /// A `data:` record whose payload was not valid JSON (raw payload kept for logs)
    Malformed(String),
}

/// Why decoding stopped early
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The cancellation token fired
    #[error("stream cancelled")]
    Cancelled,

    /// The byte source failed
    #[error(transparent)]
    Source(#[from] BackendError),
}

/// Synchronous, byte-level record framing
///
/// Feed raw reads with [`feed`](Self::feed); call [`finish`](Self::finish)
/// once the source reports end-of-data to flush an unterminated last record.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl RecordDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the sentinel (or end-of-data) has been seen
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes held back waiting for a newline
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one read and return every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let event = decode_record(&self.buffer[start..end]);
            start = end + 1;

            if let Some(event) = event {
                let is_end = event == StreamEvent::StreamEnd;
                events.push(event);
                if is_end {
                    self.finished = true;
                    self.buffer.clear();
                    return events;
                }
            }
        }

        self.buffer.drain(..start);
        events
    }

    /// Flush the trailing fragment at end-of-data
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let rest = std::mem::take(&mut self.buffer);
        decode_record(&rest).into_iter().collect()
    }
}

/// Decode a single line (without its `\n`)
fn decode_record(line: &[u8]) -> Option<StreamEvent> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;

    let Ok(payload) = std::str::from_utf8(payload) else {
        return Some(StreamEvent::Malformed(
            String::from_utf8_lossy(payload).into_owned(),
        ));
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return Some(StreamEvent::StreamEnd);
    }

    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(envelope) => envelope
            .pointer("/choices/0/delta/content")
            .and_then(serde_json::Value::as_str)
            .filter(|text| !text.is_empty())
            .map(|text| StreamEvent::Delta(text.to_string())),
        Err(_) => Some(StreamEvent::Malformed(payload.to_string())),
    }
}

/// Async decoder over a response body
///
/// Yields events lazily, one read at a time. The cancellation token is checked
/// before every event and raced against every pending read, so a cancelled
/// turn stops without waiting for the network. Once it returns `None` (or an
/// error) it stays exhausted.
pub struct StreamDecoder<S = ByteStream> {
    source: S,
    records: RecordDecoder,
    pending: VecDeque<StreamEvent>,
    cancel: CancellationToken,
    exhausted: bool,
}

impl<S> StreamDecoder<S>
where
    S: Stream<Item = Result<Bytes, BackendError>> + Unpin,
{
    /// Wrap a byte source
    pub fn new(source: S, cancel: CancellationToken) -> Self {
        Self {
            source,
            records: RecordDecoder::new(),
            pending: VecDeque::new(),
            cancel,
            exhausted: false,
        }
    }

    /// Next decoded event, or `None` once the stream has ended
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, DecodeError>> {
        loop {
            if self.cancel.is_cancelled() {
                return self.stop(DecodeError::Cancelled);
            }

            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }

            if self.exhausted {
                return None;
            }

            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return self.stop(DecodeError::Cancelled),
                read = self.source.next() => read,
            };

            match read {
                Some(Ok(bytes)) => {
                    self.pending.extend(self.records.feed(&bytes));
                    self.exhausted = self.records.is_finished();
                }
                Some(Err(e)) => return self.stop(DecodeError::Source(e)),
                None => {
                    self.pending.extend(self.records.finish());
                    self.exhausted = true;
                }
            }
        }
    }

    /// Consume the decoder as a [`Stream`]
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent, DecodeError>> {
        futures::stream::unfold(self, |mut decoder| async move {
            decoder.next_event().await.map(|item| (item, decoder))
        })
    }

    fn stop(&mut self, err: DecodeError) -> Option<Result<StreamEvent, DecodeError>> {
        if self.exhausted && self.pending.is_empty() {
            return None;
        }
        self.exhausted = true;
        self.pending.clear();
        Some(Err(err))
    }
}
