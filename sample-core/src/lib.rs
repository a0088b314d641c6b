// Real-time sample ingest buffering: time indexing, window coordination, and the ring itself.

pub mod config;
pub mod error;
pub mod ring;
pub mod timestamp;
pub mod window;

pub use config::RingConfig;
pub use error::{ConfigError, RingError};
pub use ring::{ReadOutcome, RingStats, SampleRingBuffer};
pub use timestamp::{TimeBase, Timestamp};
pub use window::{ReadGrant, WindowLock, WindowSnapshot, WriteGrant};
