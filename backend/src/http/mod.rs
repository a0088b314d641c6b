// HTTP handlers and routing.

use axum::extract::{Query, State as AxumState};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app::AppState;
use crate::constants::{LATEST_WINDOWS_DEFAULT, WINDOW_HISTORY};
use crate::ws::ws_handler;

mod types;
use types::*;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config/ring", get(get_ring_config))
        .route("/stats", get(get_stats))
        .route("/windows/latest", get(get_latest_windows))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}

async fn health(AxumState(app_state): AxumState<AppState>) -> impl IntoResponse {
    let shutting_down = app_state.is_shutting_down();
    Json(HealthResponse {
        status: if shutting_down { "stopping" } else { "ok" },
        shutting_down,
        uptime_ms: app_state.uptime_ms(),
    })
}

async fn get_ring_config(AxumState(app_state): AxumState<AppState>) -> impl IntoResponse {
    let ring = app_state.ring.config();
    Json(RingConfigResponse {
        ring: ring.clone(),
        block_size: app_state.ring.time_base().block_size(),
        max_write_span: ring.max_write_span(),
        max_read_span: ring.max_read_span(),
        consumer_window: app_state.settings.consumer_window,
    })
}

async fn get_stats(AxumState(app_state): AxumState<AppState>) -> impl IntoResponse {
    Json(app_state.stats_snapshot().await)
}

async fn get_latest_windows(
    AxumState(app_state): AxumState<AppState>,
    Query(query): Query<LatestWindowsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(LATEST_WINDOWS_DEFAULT).min(WINDOW_HISTORY);
    let windows = app_state.store.read().await.windows.latest(limit);
    Json(LatestWindowsResponse {
        count: windows.len(),
        windows,
    })
}
