//! Decode state for one streaming response and its pure transitions.
//!
//! `DecodeState` is threaded by value: each call to [`DecodeState::advance`]
//! consumes the previous state and returns the next one together with the
//! outputs the step produced. Nothing here touches the network, so recorded
//! chunks can be replayed in tests and the state sequence asserted directly.

use shared::StreamError;

use crate::payload::{interpret, Interpretation};
use crate::sse::{classify_line, drain_lines, SseLine, DATA_PREFIX};
use crate::transcript::TranscriptAccumulator;

/// Longest payload excerpt kept in a malformed-event error.
const PAYLOAD_EXCERPT_CHARS: usize = 200;

/// Output of one decode step, in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutput {
    /// Full assistant text after a fragment was applied.
    Fragment(String),
    /// One event was dropped. Not fatal.
    Malformed(StreamError),
    /// The `[DONE]` sentinel was seen.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeState {
    /// Decoded text not yet split into lines.
    text_buffer: String,
    /// An event line that looked cut off, with its terminator restored.
    pending_line: Option<String>,
    assistant: TranscriptAccumulator,
    /// Monotonic.
    terminated: bool,
    max_pending_bytes: usize,
}

impl DecodeState {
    pub fn new(max_pending_bytes: usize) -> Self {
        Self {
            text_buffer: String::new(),
            pending_line: None,
            assistant: TranscriptAccumulator::new(),
            terminated: false,
            max_pending_bytes,
        }
    }

    pub fn assistant_text(&self) -> &str {
        self.assistant.text()
    }

    pub fn fragment_count(&self) -> usize {
        self.assistant.fragment_count()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn has_pending_line(&self) -> bool {
        self.pending_line.is_some()
    }

    pub fn text_buffer(&self) -> &str {
        &self.text_buffer
    }

    /// Feed decoded text. Every complete line is drained and interpreted;
    /// the unterminated tail stays buffered. After termination the input is
    /// ignored.
    pub fn advance(mut self, text: &str) -> (Self, Vec<DecodeOutput>) {
        let mut outputs = Vec::new();
        if self.terminated {
            return (self, outputs);
        }

        self.text_buffer.push_str(text);
        for line in drain_lines(&mut self.text_buffer) {
            if self.terminated {
                break;
            }
            self.process_line(line, &mut outputs);
        }
        if self.terminated {
            self.text_buffer.clear();
        }
        (self, outputs)
    }

    /// End of input: the unterminated tail, if any, is interpreted as a final
    /// line. A line still pending afterwards is left in place for the caller
    /// to report.
    pub fn finish(mut self) -> (Self, Vec<DecodeOutput>) {
        let mut outputs = Vec::new();
        if self.terminated {
            return (self, outputs);
        }

        let tail = std::mem::take(&mut self.text_buffer);
        if !tail.is_empty() {
            let line = tail.strip_suffix('\r').unwrap_or(&tail).to_string();
            self.process_line(line, &mut outputs);
        }
        (self, outputs)
    }

    /// Close the assistant turn and return its text.
    pub fn finalize(&mut self) -> &str {
        self.assistant.finalize()
    }

    fn process_line(&mut self, line: String, outputs: &mut Vec<DecodeOutput>) {
        if let Some(mut pending) = self.pending_line.take() {
            match classify_line(&line) {
                // A new event or an event boundary: the pending one never finished.
                SseLine::Data(_) | SseLine::Blank => {
                    outputs.push(
                        self.malformed(&pending, "event ended before its payload was complete"),
                    );
                }
                // Keep-alives may arrive between the halves of an event.
                SseLine::Comment => {
                    self.pending_line = Some(pending);
                    return;
                }
                _ => {
                    pending.push_str(&line);
                    self.interpret_event(pending, outputs);
                    return;
                }
            }
        }

        match classify_line(&line) {
            SseLine::Blank | SseLine::Comment => {}
            SseLine::Unrecognized => {
                tracing::debug!(line = %line, "ignoring unrecognized line");
            }
            SseLine::Data(_) => self.interpret_event(line, outputs),
        }
    }

    fn interpret_event(&mut self, mut raw: String, outputs: &mut Vec<DecodeOutput>) {
        match interpret(payload_of(&raw)) {
            Interpretation::Done => {
                tracing::debug!("received [DONE]");
                self.terminated = true;
                self.pending_line = None;
                self.assistant.finalize();
                outputs.push(DecodeOutput::Done);
            }
            Interpretation::Fragment(fragment) => {
                if let Some(full) = self.assistant.apply(&fragment) {
                    outputs.push(DecodeOutput::Fragment(full.to_string()));
                }
            }
            Interpretation::Empty => {}
            Interpretation::Incomplete => {
                if raw.len() >= self.max_pending_bytes {
                    let reason = format!(
                        "incomplete event exceeded {} bytes",
                        self.max_pending_bytes
                    );
                    outputs.push(self.malformed(&raw, &reason));
                } else {
                    tracing::debug!(bytes = raw.len(), "event incomplete, waiting for more data");
                    raw.push('\n');
                    self.pending_line = Some(raw);
                }
            }
            Interpretation::Invalid(reason) => {
                outputs.push(self.malformed(&raw, &reason));
            }
        }
    }

    fn malformed(&self, raw: &str, reason: &str) -> DecodeOutput {
        let payload: String = payload_of(raw).chars().take(PAYLOAD_EXCERPT_CHARS).collect();
        tracing::warn!(reason = %reason, payload = %payload, "dropping malformed event");
        DecodeOutput::Malformed(StreamError::MalformedEvent {
            payload,
            reason: reason.to_string(),
        })
    }
}

fn payload_of(raw: &str) -> &str {
    raw.strip_prefix(DATA_PREFIX).unwrap_or(raw).trim()
}
