// Error taxonomy for ring configuration and fatal stream faults.
// Invariants: late writes and unwritten reads are counters, never errors.

use thiserror::Error;

use crate::timestamp::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("block size must be positive, got {0}")]
    InvalidBlockSize(i64),

    #[error("ring capacity must be positive")]
    ZeroCapacity,

    #[error("ring must carry at least one channel")]
    ZeroChannels,

    #[error("row width must be positive")]
    ZeroRowWidth,

    #[error("history {history} plus delay {delay} must stay below capacity {capacity}")]
    WindowTooLarge {
        history: usize,
        delay: usize,
        capacity: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The whole requested span lies behind the retained history. The consumer
    /// cadence does not fit the buffer sizing; the stream must halt.
    #[error("read [{begin}, {end}) expired behind floor {floor} before the writer reached it; consumer cadence exceeds retained history")]
    Expired {
        begin: Timestamp,
        end: Timestamp,
        floor: Timestamp,
    },

    #[error("span of {count} rows exceeds the {limit} rows this ring can serve per call")]
    SpanTooLarge { count: usize, limit: usize },

    #[error("{what}: expected at least {expected} values, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl RingError {
    /// Whether the error means the stream can no longer make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RingError::Expired { .. })
    }
}
