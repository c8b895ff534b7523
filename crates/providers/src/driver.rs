//! Stream driver: pulls chunks, runs them through decoding and reports to a
//! [`StreamConsumer`].
//!
//! States: `Idle -> Streaming -> {Completed, Failed, Cancelled}`. Chunks are
//! processed strictly one after another; the only await point is the read of
//! the next chunk, which is also where cancellation is observed. A chunk that
//! has been received is always interpreted to the end.

use std::time::Duration;

use futures::{Stream, StreamExt};
use shared::settings::MentorSettings;
use shared::{ErrorKind, StreamError, StreamEvent};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::decode::{DecodeOutput, DecodeState};
use crate::sse::Utf8Decoder;

/// Receiver of partial updates for one streaming response. Calls arrive in
/// order and never concurrently.
pub trait StreamConsumer {
    /// Full assistant text so far, after each non-empty fragment.
    fn on_fragment(&mut self, full_text: &str);

    fn on_completed(&mut self);

    fn on_error(&mut self, kind: ErrorKind, message: &str);

    fn on_cancelled(&mut self) {}

    /// A single event was dropped; the stream goes on.
    fn on_diagnostic(&mut self, _error: &StreamError) {}
}

/// Forwards callbacks as [`StreamEvent`]s over an unbounded channel.
pub struct ChannelConsumer {
    tx: UnboundedSender<StreamEvent>,
}

impl ChannelConsumer {
    pub fn new(tx: UnboundedSender<StreamEvent>) -> Self {
        Self { tx }
    }
}

impl StreamConsumer for ChannelConsumer {
    fn on_fragment(&mut self, full_text: &str) {
        let _ = self.tx.send(StreamEvent::Fragment(full_text.to_string()));
    }

    fn on_completed(&mut self) {
        let _ = self.tx.send(StreamEvent::Completed);
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        let _ = self.tx.send(StreamEvent::Error {
            kind,
            message: message.to_string(),
        });
    }

    fn on_cancelled(&mut self) {
        let _ = self.tx.send(StreamEvent::Cancelled);
    }

    fn on_diagnostic(&mut self, error: &StreamError) {
        let _ = self.tx.send(StreamEvent::Diagnostic(error.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Completed,
    Failed(StreamError),
    Cancelled,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Failed(_) | StreamState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Fail when the transport closes before `[DONE]`.
    pub require_done_sentinel: bool,
    pub max_pending_event_bytes: usize,
    /// Longest wait for the next chunk. Resets with every chunk, so a slow
    /// but live stream is never cut off.
    pub idle_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::from(&MentorSettings::default())
    }
}

impl From<&MentorSettings> for DriverOptions {
    fn from(settings: &MentorSettings) -> Self {
        Self {
            require_done_sentinel: settings.require_done_sentinel,
            max_pending_event_bytes: settings.max_pending_event_bytes,
            idle_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

/// Final state of a stream plus the assistant text it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub state: StreamState,
    pub text: String,
}

pub struct StreamDriver {
    options: DriverOptions,
    state: StreamState,
}

impl StreamDriver {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            state: StreamState::Idle,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Fail before any bytes are read (rejected status, request error).
    pub fn fail<C: StreamConsumer>(&mut self, error: StreamError, consumer: &mut C) -> StreamOutcome {
        self.transition(StreamState::Failed(error), consumer);
        StreamOutcome {
            state: self.state.clone(),
            text: String::new(),
        }
    }

    /// Cancel before streaming started.
    pub fn cancel<C: StreamConsumer>(&mut self, consumer: &mut C) -> StreamOutcome {
        self.transition(StreamState::Cancelled, consumer);
        StreamOutcome {
            state: self.state.clone(),
            text: String::new(),
        }
    }

    /// Consume `source` until `[DONE]`, end of input, an error, or cancellation.
    pub async fn run<S, B, E, C>(
        &mut self,
        source: S,
        consumer: &mut C,
        cancel: &CancellationToken,
    ) -> StreamOutcome
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
        C: StreamConsumer,
    {
        if self.state != StreamState::Idle {
            tracing::warn!(state = ?self.state, "stream driver already used");
            return StreamOutcome {
                state: self.state.clone(),
                text: String::new(),
            };
        }
        self.state = StreamState::Streaming;
        tracing::info!("streaming response");

        let mut source = std::pin::pin!(source);
        let mut decoder = Utf8Decoder::new();
        let mut decode = DecodeState::new(self.options.max_pending_event_bytes);

        loop {
            let next = tokio::time::timeout(self.options.idle_timeout, source.next());
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.close(StreamState::Cancelled, decode, consumer);
                }
                chunk = next => chunk,
            };
            let Ok(chunk) = chunk else {
                let error = StreamError::TransportFailure(format!(
                    "no data received for {:?}",
                    self.options.idle_timeout
                ));
                return self.close(StreamState::Failed(error), decode, consumer);
            };

            match chunk {
                Some(Ok(bytes)) => {
                    let text = match decoder.decode(bytes.as_ref()) {
                        Ok(text) => text,
                        Err(e) => return self.close(StreamState::Failed(e), decode, consumer),
                    };
                    let (next, outputs) = decode.advance(&text);
                    decode = next;
                    deliver(outputs, consumer);
                    if decode.is_terminated() {
                        return self.close(StreamState::Completed, decode, consumer);
                    }
                }
                Some(Err(e)) => {
                    let error = StreamError::TransportFailure(format!("stream read error: {}", e));
                    return self.close(StreamState::Failed(error), decode, consumer);
                }
                None => return self.end_of_input(decoder, decode, consumer),
            }
        }
    }

    fn end_of_input<C: StreamConsumer>(
        &mut self,
        mut decoder: Utf8Decoder,
        decode: DecodeState,
        consumer: &mut C,
    ) -> StreamOutcome {
        if let Err(e) = decoder.finish() {
            return self.close(StreamState::Failed(e), decode, consumer);
        }

        let (decode, outputs) = decode.finish();
        deliver(outputs, consumer);

        let state = if decode.is_terminated() {
            StreamState::Completed
        } else if decode.has_pending_line() {
            StreamState::Failed(StreamError::Decode(
                "stream ended inside an incomplete event".into(),
            ))
        } else if self.options.require_done_sentinel {
            StreamState::Failed(StreamError::TransportFailure(
                "stream closed before [DONE]".into(),
            ))
        } else {
            tracing::debug!("stream closed without [DONE]");
            StreamState::Completed
        };
        self.close(state, decode, consumer)
    }

    fn close<C: StreamConsumer>(
        &mut self,
        state: StreamState,
        mut decode: DecodeState,
        consumer: &mut C,
    ) -> StreamOutcome {
        let text = decode.finalize().to_string();
        self.transition(state, consumer);
        StreamOutcome {
            state: self.state.clone(),
            text,
        }
    }

    fn transition<C: StreamConsumer>(&mut self, next: StreamState, consumer: &mut C) {
        if self.state.is_terminal() {
            tracing::warn!(state = ?self.state, "ignoring transition out of terminal state");
            return;
        }
        match &next {
            StreamState::Completed => {
                tracing::info!("stream completed");
                consumer.on_completed();
            }
            StreamState::Failed(e) => {
                tracing::warn!(error = %e, "stream failed");
                consumer.on_error(e.kind(), &e.to_string());
            }
            StreamState::Cancelled => {
                tracing::info!("stream cancelled");
                consumer.on_cancelled();
            }
            StreamState::Idle | StreamState::Streaming => {}
        }
        self.state = next;
    }
}

fn deliver<C: StreamConsumer>(outputs: Vec<DecodeOutput>, consumer: &mut C) {
    for output in outputs {
        match output {
            DecodeOutput::Fragment(text) => consumer.on_fragment(&text),
            DecodeOutput::Malformed(e) => consumer.on_diagnostic(&e),
            DecodeOutput::Done => {}
        }
    }
}
