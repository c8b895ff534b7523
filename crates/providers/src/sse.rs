//! Text layer of the event stream: UTF-8 decoding across chunk boundaries,
//! newline framing, and line classification.
//!
//! Wire format: one event per line (`data: <payload>`), `:` comment lines and
//! blank lines are ignored.

use shared::StreamError;

/// Prefix of an event-data line. Exact and case-sensitive.
pub const DATA_PREFIX: &str = "data: ";

/// Incremental UTF-8 decoder that holds back a multi-byte character split
/// across chunks until its remaining bytes arrive.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk. Bytes that start an incomplete character are kept
    /// and prepended to the next chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String, StreamError> {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        match std::str::from_utf8(&bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(e) => match e.error_len() {
                // Truncated at the end: keep the tail for the next chunk.
                None => {
                    let valid = e.valid_up_to();
                    self.pending = bytes.split_off(valid);
                    String::from_utf8(bytes).map_err(|e| StreamError::Decode(e.to_string()))
                }
                Some(len) => Err(StreamError::Decode(format!(
                    "invalid UTF-8 sequence of {} byte(s) at offset {}",
                    len,
                    e.valid_up_to()
                ))),
            },
        }
    }

    /// Whether bytes of an unfinished character are being held.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// End of input. A held partial character can never complete.
    pub fn finish(&mut self) -> Result<(), StreamError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let held = std::mem::take(&mut self.pending);
        Err(StreamError::Decode(format!(
            "stream ended inside a multi-byte character ({} byte(s) held)",
            held.len()
        )))
    }
}

/// Remove every complete line from `buffer`, in order, with the `\n` (and an
/// optional preceding `\r`) stripped. The unterminated tail stays buffered.
pub fn drain_lines(buffer: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    while let Some(offset) = buffer[start..].find('\n') {
        let end = start + offset;
        let line = &buffer[start..end];
        lines.push(line.strip_suffix('\r').unwrap_or(line).to_string());
        start = end + 1;
    }
    if start > 0 {
        buffer.drain(..start);
    }
    lines
}

/// Classification of one framed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    Blank,
    Comment,
    /// Event-data line; the payload has surrounding whitespace trimmed.
    Data(&'a str),
    /// Any other shape (e.g. `event:` or `id:` fields). Ignored.
    Unrecognized,
}

pub fn classify_line(line: &str) -> SseLine<'_> {
    if line.trim().is_empty() {
        return SseLine::Blank;
    }
    if line.starts_with(':') {
        return SseLine::Comment;
    }
    match line.strip_prefix(DATA_PREFIX) {
        Some(payload) => SseLine::Data(payload.trim()),
        None => SseLine::Unrecognized,
    }
}
