// Summary of one consumed window, kept in history and streamed to clients.

use sample_core::{ReadOutcome, TimeBase, Timestamp};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WindowSummary {
    pub begin: Timestamp,
    pub sequence_id: i64,
    pub block_id: i64,
    pub count: usize,
    pub accepted: usize,
    pub invalid: usize,
    /// Mean over every value of each channel lane, zero-filled rows included.
    pub channel_means: Vec<f32>,
    pub completed_ms: u64,
}

impl WindowSummary {
    pub fn from_lanes(
        begin: Timestamp,
        count: usize,
        lanes: &[Vec<f32>],
        outcome: ReadOutcome,
        time_base: &TimeBase,
        completed_ms: u64,
    ) -> Self {
        let channel_means = lanes
            .iter()
            .map(|lane| {
                if lane.is_empty() {
                    0.0
                } else {
                    lane.iter().sum::<f32>() / lane.len() as f32
                }
            })
            .collect();

        Self {
            begin,
            sequence_id: begin.sequence_id(time_base),
            block_id: begin.block_id(time_base),
            count,
            accepted: outcome.accepted,
            invalid: outcome.invalid,
            channel_means,
            completed_ms,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.invalid == 0
    }
}
