//! Protocol error taxonomy.

/// Errors produced by the frame codec and the command session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ViaProtocolError {
    /// Command parameters exceed the frame's parameter capacity.
    #[error("command parameters too large: {len} bytes exceeds capacity {capacity}")]
    ParamsTooLarge { len: usize, capacity: usize },

    /// Response shorter than the fixed report size.
    #[error("malformed response frame: {len} bytes, expected at least {expected}")]
    MalformedFrame { len: usize, expected: usize },

    /// No response arrived within the command timeout.
    ///
    /// The effect of the command on the device is unknown; callers must not
    /// assume success or failure of the underlying write.
    #[error("no response within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport-level failure on write or read.
    #[error("transport error: {0}")]
    Transport(String),
}
