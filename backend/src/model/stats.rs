// Producer and consumer totals plus the combined stats payload.

use sample_core::{RingStats, Timestamp};
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProducerTotals {
    pub ticks: u64,
    pub ticks_withheld: u64,
    pub rows_offered: u64,
    pub rows_accepted: u64,
    pub next_time: Timestamp,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerTotals {
    pub windows: u64,
    pub rows: u64,
    pub invalid_rows: u64,
    pub incomplete_windows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_begin: Option<Timestamp>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatsSnapshot {
    pub ring: RingStats,
    pub producer: ProducerTotals,
    pub consumer: ConsumerTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
}
