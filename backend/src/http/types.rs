// HTTP request and response payload types.

use sample_core::RingConfig;
use serde::{Deserialize, Serialize};

use crate::model::WindowSummary;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub shutting_down: bool,
    pub uptime_ms: u64,
}

#[derive(Serialize)]
pub struct RingConfigResponse {
    pub ring: RingConfig,
    pub block_size: i64,
    pub max_write_span: usize,
    pub max_read_span: usize,
    pub consumer_window: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestWindowsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LatestWindowsResponse {
    pub count: usize,
    pub windows: Vec<WindowSummary>,
}
