//! Error taxonomy for one streaming response.

use serde::{Deserialize, Serialize};

/// Coarse error class reported to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RateLimited,
    QuotaExceeded,
    TransportFailure,
    DecodeError,
    MalformedEvent,
}

impl ErrorKind {
    /// Short notice for the user. Rate limiting and quota get their own text
    /// since the remedy differs (wait vs. top up).
    pub fn user_notice(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "Rate limit reached. Please try again in a moment.",
            ErrorKind::QuotaExceeded => {
                "AI credits exhausted. Please add more credits to continue."
            }
            _ => "Failed to get response. Please try again.",
        }
    }
}

/// Stream errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("Rate limited by the server (HTTP 429)")]
    RateLimited,

    #[error("Quota exceeded (HTTP 402)")]
    QuotaExceeded,

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Malformed event ({reason}): {payload}")]
    MalformedEvent { payload: String, reason: String },
}

impl StreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::RateLimited => ErrorKind::RateLimited,
            StreamError::QuotaExceeded => ErrorKind::QuotaExceeded,
            StreamError::TransportFailure(_) => ErrorKind::TransportFailure,
            StreamError::Decode(_) => ErrorKind::DecodeError,
            StreamError::MalformedEvent { .. } => ErrorKind::MalformedEvent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_distinguish_rate_limit_and_quota() {
        assert_ne!(
            ErrorKind::RateLimited.user_notice(),
            ErrorKind::QuotaExceeded.user_notice()
        );
        assert_eq!(
            StreamError::TransportFailure("503".into()).kind().user_notice(),
            StreamError::Decode("x".into()).kind().user_notice()
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(StreamError::QuotaExceeded.kind(), ErrorKind::QuotaExceeded);
        let malformed = StreamError::MalformedEvent {
            payload: "{not json}".into(),
            reason: "expected value".into(),
        };
        assert_eq!(malformed.kind(), ErrorKind::MalformedEvent);
        assert_eq!(
            StreamError::TransportFailure("reset".into()).kind(),
            ErrorKind::TransportFailure
        );
    }
}
