//! Interpretation of one event payload.

use serde::Deserialize;

/// Literal payload marking intentional end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

// ── Streaming response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Result of interpreting a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// The `[DONE]` sentinel.
    Done,
    /// Non-empty `choices[0].delta.content`.
    Fragment(String),
    /// Parsed, but carries no content.
    Empty,
    /// Did not parse and looks cut off; more bytes may complete it.
    Incomplete,
    /// Did not parse and never will.
    Invalid(String),
}

/// Structural shape of a payload that failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameShape {
    /// Ends inside a string literal or with unclosed `{` / `[`.
    Incomplete,
    /// Balanced, or closed something that was never opened or not the
    /// innermost open one.
    Invalid,
}

/// Cheap balance check over braces, brackets and string quotes.
pub fn frame_shape(payload: &str) -> FrameShape {
    // Closers still owed, innermost last.
    let mut expected: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in payload.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => expected.push('}'),
            '[' => expected.push(']'),
            '}' | ']' => {
                if expected.pop() != Some(c) {
                    return FrameShape::Invalid;
                }
            }
            _ => {}
        }
    }

    if in_string || !expected.is_empty() {
        FrameShape::Incomplete
    } else {
        FrameShape::Invalid
    }
}

pub fn interpret(payload: &str) -> Interpretation {
    if payload == DONE_SENTINEL {
        return Interpretation::Done;
    }

    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            return match frame_shape(payload) {
                FrameShape::Incomplete => Interpretation::Incomplete,
                FrameShape::Invalid => Interpretation::Invalid(e.to_string()),
            };
        }
    };

    // Valid JSON of an unexpected shape carries no content.
    let parsed: StreamPayload = match serde_json::from_value(value) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "payload without a choices array");
            return Interpretation::Empty;
        }
    };

    let Some(choice) = parsed.choices.into_iter().next() else {
        return Interpretation::Empty;
    };
    if let Some(reason) = &choice.finish_reason {
        tracing::debug!(finish_reason = %reason, "choice finished");
    }
    match choice.delta.and_then(|d| d.content) {
        Some(content) if !content.is_empty() => Interpretation::Fragment(content),
        _ => Interpretation::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel() {
        assert_eq!(interpret("[DONE]"), Interpretation::Done);
    }

    #[test]
    fn test_content_fragment() {
        let payload = r#"{"choices":[{"delta":{"content":"SIPs"}}]}"#;
        assert_eq!(interpret(payload), Interpretation::Fragment("SIPs".into()));
    }

    #[test]
    fn test_only_first_choice_is_read() {
        let payload = r#"{"choices":[{"delta":{}},{"delta":{"content":"second"}}]}"#;
        assert_eq!(interpret(payload), Interpretation::Empty);
    }

    #[test]
    fn test_empty_and_missing_content() {
        assert_eq!(
            interpret(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            Interpretation::Empty
        );
        assert_eq!(
            interpret(r#"{"choices":[{"delta":{"content":""}}]}"#),
            Interpretation::Empty
        );
        assert_eq!(
            interpret(r#"{"choices":[{"delta":{"content":null},"finish_reason":"stop"}]}"#),
            Interpretation::Empty
        );
        assert_eq!(interpret(r#"{"choices":[]}"#), Interpretation::Empty);
        assert_eq!(interpret(r#"{"id":"chatcmpl-1"}"#), Interpretation::Empty);
        assert_eq!(interpret(r#"{"choices":"oops"}"#), Interpretation::Empty);
    }

    #[test]
    fn test_cut_off_payload_is_incomplete() {
        assert_eq!(
            interpret(r#"{"choices":[{"delta":{"content":"hi"#),
            Interpretation::Incomplete
        );
        assert_eq!(interpret(r#"{"choices":["#), Interpretation::Incomplete);
    }

    #[test]
    fn test_balanced_garbage_is_invalid() {
        assert!(matches!(
            interpret("{not json at all}"),
            Interpretation::Invalid(_)
        ));
        assert!(matches!(interpret("hello"), Interpretation::Invalid(_)));
        assert!(matches!(interpret("}{"), Interpretation::Invalid(_)));
    }

    #[test]
    fn test_frame_shape_ignores_brackets_inside_strings() {
        assert_eq!(frame_shape(r#"{"a":"}}]]"#), FrameShape::Incomplete);
        assert_eq!(frame_shape(r#"{"a":"{[\"x"}"#), FrameShape::Invalid);
        assert_eq!(frame_shape(r#"{"a":"\\"#), FrameShape::Incomplete);
    }

    #[test]
    fn test_mismatched_closer_is_invalid() {
        assert_eq!(frame_shape(r#"[{"a":1]"#), FrameShape::Invalid);
        assert_eq!(frame_shape(r#"{"a":[1}"#), FrameShape::Invalid);
        assert!(matches!(interpret(r#"[{"a":1]"#), Interpretation::Invalid(_)));
        assert_eq!(frame_shape(r#"[{"a":1}"#), FrameShape::Incomplete);
    }
}
