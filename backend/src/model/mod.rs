// Service data models for consumed windows and pipeline totals.

mod stats;
mod window;

pub use stats::{ConsumerTotals, ProducerTotals, StatsSnapshot};
pub use window::WindowSummary;
