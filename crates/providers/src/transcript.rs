/// Running assistant text for one turn.
///
/// Fragments are appended in arrival order; the text only grows until the
/// turn is finalized, after which it is read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptAccumulator {
    text: String,
    fragments: usize,
    finalized: bool,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the full text so far. Returns `None` once
    /// the turn has been finalized.
    pub fn apply(&mut self, fragment: &str) -> Option<&str> {
        if self.finalized {
            return None;
        }
        self.text.push_str(fragment);
        self.fragments += 1;
        Some(&self.text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of fragments applied this turn.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Close the turn. Further fragments are refused.
    pub fn finalize(&mut self) -> &str {
        self.finalized = true;
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_returns_full_text() {
        let mut acc = TranscriptAccumulator::new();
        assert_eq!(acc.apply("SIP"), Some("SIP"));
        assert_eq!(acc.apply("s are great"), Some("SIPs are great"));
        assert_eq!(acc.fragment_count(), 2);
    }

    #[test]
    fn test_finalize_freezes_text() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply("done");
        assert_eq!(acc.finalize(), "done");
        assert_eq!(acc.apply(" more"), None);
        assert_eq!(acc.text(), "done");
    }
}
