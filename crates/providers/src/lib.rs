//! Streaming chat client: incremental event-stream decoding and the HTTP
//! request that feeds it.

pub mod decode;
pub mod driver;
pub mod mentor;
pub mod payload;
pub mod sse;
pub mod transcript;

pub use driver::{
    ChannelConsumer, DriverOptions, StreamConsumer, StreamDriver, StreamOutcome, StreamState,
};
pub use mentor::{classify_status, MentorClient};
