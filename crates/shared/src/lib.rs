pub mod error;
pub mod events;

pub use error::{ErrorKind, StreamError};
pub use events::StreamEvent;

pub mod settings {
    use anyhow::{Context, Result};
    use serde::{Deserialize, Serialize};
    use std::path::Path;

    pub const DEFAULT_GREETING: &str = "Hi! I'm your AI financial mentor. I can help you understand investing, SIPs, mutual funds, budgeting, and more. What would you like to learn about today?";

    fn default_base_url() -> String {
        "http://localhost:54321".into()
    }

    fn default_function_path() -> String {
        "/functions/v1/ai-mentor".into()
    }

    fn default_max_pending_event_bytes() -> usize {
        64 * 1024
    }

    fn default_request_timeout_secs() -> u64 {
        120
    }

    fn default_greeting() -> String {
        DEFAULT_GREETING.into()
    }

    /// Connection and decoding settings for the mentor chat endpoint.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MentorSettings {
        #[serde(default = "default_base_url")]
        pub base_url: String,
        #[serde(default = "default_function_path")]
        pub function_path: String,
        /// Sent as `Authorization: Bearer <key>` when present.
        #[serde(default)]
        pub api_key: Option<String>,
        /// Treat transport close without `[DONE]` as a failure instead of a
        /// normal completion.
        #[serde(default)]
        pub require_done_sentinel: bool,
        /// Upper bound for an event that is still waiting for its remaining bytes.
        #[serde(default = "default_max_pending_event_bytes")]
        pub max_pending_event_bytes: usize,
        /// Longest wait for the response headers, and then for each chunk.
        #[serde(default = "default_request_timeout_secs")]
        pub request_timeout_secs: u64,
        /// Assistant message every new transcript opens with.
        #[serde(default = "default_greeting")]
        pub greeting: String,
    }

    impl Default for MentorSettings {
        fn default() -> Self {
            Self {
                base_url: default_base_url(),
                function_path: default_function_path(),
                api_key: None,
                require_done_sentinel: false,
                max_pending_event_bytes: default_max_pending_event_bytes(),
                request_timeout_secs: default_request_timeout_secs(),
                greeting: default_greeting(),
            }
        }
    }

    impl MentorSettings {
        /// Full endpoint URL (`base_url` joined with `function_path`).
        pub fn endpoint_url(&self) -> String {
            let base = self.base_url.trim_end_matches('/');
            let path = self.function_path.trim_start_matches('/');
            format!("{}/{}", base, path)
        }

        /// Read settings from a JSON file. A missing file yields defaults; a
        /// file that exists but cannot be parsed is an error.
        pub fn load_from(path: &Path) -> Result<Self> {
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("invalid settings file {}", path.display()))
        }

        /// Apply `MENTOR_BASE_URL`, `MENTOR_API_KEY` and `MENTOR_REQUIRE_DONE`.
        pub fn apply_env_overrides(&mut self) {
            self.apply_overrides(|key| std::env::var(key).ok());
        }

        pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
            if let Some(url) = lookup("MENTOR_BASE_URL").filter(|v| !v.trim().is_empty()) {
                self.base_url = url;
            }
            if let Some(key) = lookup("MENTOR_API_KEY").filter(|v| !v.trim().is_empty()) {
                self.api_key = Some(key);
            }
            if let Some(v) = lookup("MENTOR_REQUIRE_DONE") {
                self.require_done_sentinel = v == "1" || v.eq_ignore_ascii_case("true");
            }
        }
    }

}

pub mod agent_api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        User,
        Assistant,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: Role,
        pub content: String,
    }

    impl ChatMessage {
        pub fn user(content: impl Into<String>) -> Self {
            Self {
                role: Role::User,
                content: content.into(),
            }
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self {
                role: Role::Assistant,
                content: content.into(),
            }
        }
    }

    /// Chronological chat history, owned by the consumer.
    ///
    /// Only the trailing assistant message of the turn currently streaming is
    /// mutable; every earlier message is closed.
    #[derive(Debug, Clone, Default)]
    pub struct Transcript {
        messages: Vec<ChatMessage>,
        open_turn: bool,
    }

    impl Transcript {
        pub fn new() -> Self {
            Self::default()
        }

        /// Start a transcript with a closed assistant greeting.
        pub fn with_greeting(greeting: impl Into<String>) -> Self {
            Self {
                messages: vec![ChatMessage::assistant(greeting)],
                open_turn: false,
            }
        }

        pub fn messages(&self) -> &[ChatMessage] {
            &self.messages
        }

        pub fn len(&self) -> usize {
            self.messages.len()
        }

        pub fn is_empty(&self) -> bool {
            self.messages.is_empty()
        }

        pub fn last(&self) -> Option<&ChatMessage> {
            self.messages.last()
        }

        pub fn is_turn_open(&self) -> bool {
            self.open_turn
        }

        /// Append a user message, closing any assistant turn still open.
        pub fn push_user(&mut self, content: impl Into<String>) {
            self.open_turn = false;
            self.messages.push(ChatMessage::user(content));
        }

        /// Show the running assistant text for the current turn: the first
        /// call of a turn opens a new message, later calls replace its content.
        pub fn upsert_assistant(&mut self, full_text: &str) {
            if self.open_turn {
                if let Some(last) = self.messages.last_mut() {
                    last.content.clear();
                    last.content.push_str(full_text);
                    return;
                }
            }
            self.messages.push(ChatMessage::assistant(full_text));
            self.open_turn = true;
        }

        /// Close the current assistant turn. Later fragments open a new message.
        pub fn close_turn(&mut self) {
            self.open_turn = false;
        }
    }

}
