// Shared constants for service timing, protocol, and default sizing.

pub const SCHEMA_VERSION: &str = "1.0";
pub const STATS_INTERVAL_MS: u64 = 500;
pub const BROADCAST_CAPACITY: usize = 256;
pub const WINDOW_HISTORY: usize = 64;
pub const LATEST_WINDOWS_DEFAULT: usize = 8;

pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 10087;

pub const DEFAULT_RING_CAPACITY: usize = 8192;
pub const DEFAULT_RING_CHANNELS: usize = 4;
pub const DEFAULT_RING_ROW_WIDTH: usize = 1;
pub const DEFAULT_RING_HISTORY: usize = 512;
pub const DEFAULT_RING_DELAY: usize = 0;
pub const DEFAULT_READ_WAIT_MS: u64 = 1_000;
pub const DEFAULT_BLOCK_SIZE: i64 = 256;

pub const DEFAULT_ROWS_PER_TICK: usize = 64;
pub const DEFAULT_TICK_MS: u64 = 10;
pub const DEFAULT_LOSS_EVERY: u64 = 0;
pub const DEFAULT_CONSUMER_WINDOW: usize = 256;
