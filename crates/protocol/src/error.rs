//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Poll reply shorter than the fixed 4-byte layout
    #[error("Short poll reply: expected {expected} bytes, got {actual}")]
    ShortPollReply { expected: usize, actual: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
