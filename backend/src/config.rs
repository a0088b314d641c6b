// Station settings resolved from the environment with fallback defaults.
// Invariants: a constructed StationSettings always describes a ring that can be allocated.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use sample_core::{RingConfig, RingError, TimeBase};
use serde::Serialize;
use tracing::warn;

use crate::constants::{
    DEFAULT_BLOCK_SIZE, DEFAULT_CONSUMER_WINDOW, DEFAULT_HTTP_BIND, DEFAULT_HTTP_PORT, DEFAULT_LOSS_EVERY,
    DEFAULT_READ_WAIT_MS, DEFAULT_RING_CAPACITY, DEFAULT_RING_CHANNELS, DEFAULT_RING_DELAY,
    DEFAULT_RING_HISTORY, DEFAULT_RING_ROW_WIDTH, DEFAULT_ROWS_PER_TICK, DEFAULT_TICK_MS,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceSettings {
    pub rows_per_tick: usize,
    pub tick_ms: u64,
    /// Every n-th tick is withheld from the ring; zero disables loss.
    pub loss_every: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StationSettings {
    pub http_addr: SocketAddr,
    pub ring: RingConfig,
    pub time_base: TimeBase,
    pub source: SourceSettings,
    pub consumer_window: usize,
}

impl StationSettings {
    pub fn from_env() -> Result<Self, RingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, RingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("HTTP_BIND").unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let port = parse_or(&lookup, "HTTP_PORT", DEFAULT_HTTP_PORT);
        let http_addr = match format!("{}:{}", bind, port).parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(err) => {
                warn!(%bind, port, %err, "invalid HTTP_BIND; falling back to localhost");
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
            }
        };

        let read_wait_ms = match lookup("RING_READ_WAIT_MS") {
            Some(value) if value.trim().eq_ignore_ascii_case("none") => None,
            Some(_) => Some(parse_or(&lookup, "RING_READ_WAIT_MS", DEFAULT_READ_WAIT_MS)),
            None => Some(DEFAULT_READ_WAIT_MS),
        };

        let ring = RingConfig {
            capacity: parse_or(&lookup, "RING_CAPACITY", DEFAULT_RING_CAPACITY),
            channels: parse_or(&lookup, "RING_CHANNELS", DEFAULT_RING_CHANNELS),
            row_width: parse_or(&lookup, "RING_ROW_WIDTH", DEFAULT_RING_ROW_WIDTH),
            history: parse_or(&lookup, "RING_HISTORY", DEFAULT_RING_HISTORY),
            delay: parse_or(&lookup, "RING_DELAY", DEFAULT_RING_DELAY),
            read_wait_ms,
        };
        let time_base = TimeBase::new(parse_or(&lookup, "RING_BLOCK_SIZE", DEFAULT_BLOCK_SIZE))?;

        let source = SourceSettings {
            rows_per_tick: parse_or(&lookup, "SOURCE_ROWS_PER_TICK", DEFAULT_ROWS_PER_TICK).max(1),
            tick_ms: parse_or(&lookup, "SOURCE_TICK_MS", DEFAULT_TICK_MS).max(1),
            loss_every: parse_or(&lookup, "SOURCE_LOSS_EVERY", DEFAULT_LOSS_EVERY),
        };

        let settings = Self {
            http_addr,
            ring,
            time_base,
            source,
            consumer_window: parse_or(&lookup, "CONSUMER_WINDOW", DEFAULT_CONSUMER_WINDOW).max(1),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the ring shape and that producer ticks and consumer windows fit in one call.
    pub fn validate(&self) -> Result<(), RingError> {
        self.ring.validate()?;
        check_span(self.source.rows_per_tick, self.ring.max_write_span())?;
        check_span(self.consumer_window, self.ring.max_read_span())?;
        Ok(())
    }
}

fn check_span(count: usize, limit: usize) -> Result<(), RingError> {
    if count > limit {
        return Err(RingError::SpanTooLarge { count, limit });
    }
    Ok(())
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, %value, "unparseable setting; using default");
                default
            }
        },
        None => default,
    }
}
