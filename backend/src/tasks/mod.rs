// Background tasks: windowed consumer, periodic stats updates, and pipeline spawning.

use std::time::Duration;

use sample_core::ReadOutcome;
use tokio::task::{self, JoinHandle};
use tokio::time;
use tracing::{error, info, warn};

use crate::app::AppState;
use crate::constants::STATS_INTERVAL_MS;
use crate::model::WindowSummary;
use crate::source::producer_task;
use crate::ws::{publish, StatsUpdateBody, WindowSummaryBody};

/// Start the producer, consumer and stats tasks for one observation.
pub fn spawn_pipeline(app_state: &AppState) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(producer_task(app_state.clone())),
        tokio::spawn(consumer_task(app_state.clone())),
        tokio::spawn(stats_update_task(app_state.clone())),
    ]
}

pub async fn consumer_task(app_state: AppState) {
    let settings = app_state.settings.clone();
    let window = settings.consumer_window;
    let ring = app_state.ring.clone();
    let mut begin = match task::spawn_blocking(move || ring.start_read()).await {
        Ok(begin) => begin,
        Err(err) => {
            warn!(?err, "consumer start failed");
            return;
        }
    };
    info!(%begin, window, "consumer started");

    let mut lanes = vec![vec![0.0f32; window * settings.ring.row_width]; settings.ring.channels];
    loop {
        if app_state.is_shutting_down() {
            break;
        }

        let ring = app_state.ring.clone();
        let joined = task::spawn_blocking(move || {
            let outcome = {
                let mut out: Vec<&mut [f32]> = lanes.iter_mut().map(Vec::as_mut_slice).collect();
                ring.read(begin, window, &mut out)
            };
            (lanes, outcome)
        })
        .await;

        let outcome = match joined {
            Ok((returned, outcome)) => {
                lanes = returned;
                outcome
            }
            Err(err) => {
                warn!(?err, "consumer read task failed");
                break;
            }
        };

        match outcome {
            // Only a shut-down ring serves an empty outcome for a non-empty window.
            Ok(outcome) if outcome == ReadOutcome::default() => break,
            Ok(outcome) => {
                let summary = WindowSummary::from_lanes(
                    begin,
                    window,
                    &lanes,
                    outcome,
                    &settings.time_base,
                    app_state.uptime_ms(),
                );
                app_state.store.write().await.record_window(summary.clone());
                publish(&app_state, "window_summary", WindowSummaryBody { window: summary });
                begin += window as i64;
            }
            Err(err) if err.is_fatal() => {
                error!(%err, %begin, "consumer fell behind retained history");
                app_state.halt(&err).await;
                break;
            }
            Err(err) => {
                warn!(%err, "consumer read rejected");
                break;
            }
        }
    }

    let consumer = app_state.store.read().await.consumer.clone();
    info!(
        windows = consumer.windows,
        rows = consumer.rows,
        invalid_rows = consumer.invalid_rows,
        "consumer stopped"
    );
}

pub async fn stats_update_task(app_state: AppState) {
    let mut shutdown_rx = app_state.shutdown_rx();
    let mut interval = time::interval(Duration::from_millis(STATS_INTERVAL_MS));
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.wait_for(|stopped| *stopped) => break,
        }
        let stats = app_state.stats_snapshot().await;
        publish(&app_state, "stats_update", StatsUpdateBody { stats });
    }
}
