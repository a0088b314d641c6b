// Construction options for a sample ring.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Time units spanned by the ring.
    pub capacity: usize,
    /// Parallel lanes stored for every time unit.
    pub channels: usize,
    /// Values per channel per time unit.
    pub row_width: usize,
    /// Span behind the read cursor that stays owned by its old time and can
    /// still be requested without a fatal expiry.
    pub history: usize,
    /// Lead the writer must have over the end of a read before it is served.
    pub delay: usize,
    /// Upper bound on how long a read waits for the writer. `None` waits until
    /// data arrives or the ring shuts down.
    pub read_wait_ms: Option<u64>,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            channels: 1,
            row_width: 1,
            history: 256,
            delay: 0,
            read_wait_ms: None,
        }
    }
}

impl RingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        if self.row_width == 0 {
            return Err(ConfigError::ZeroRowWidth);
        }
        if self.history.saturating_add(self.delay) >= self.capacity {
            return Err(ConfigError::WindowTooLarge {
                history: self.history,
                delay: self.delay,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn read_wait(&self) -> Option<Duration> {
        self.read_wait_ms.map(Duration::from_millis)
    }

    /// Largest `count` a single write may carry.
    pub fn max_write_span(&self) -> usize {
        self.capacity - self.history
    }

    /// Largest `count` a single read may request.
    pub fn max_read_span(&self) -> usize {
        self.capacity - self.history - self.delay
    }

    /// Values in one full multi-channel record.
    pub fn record_width(&self) -> usize {
        self.channels * self.row_width
    }
}
