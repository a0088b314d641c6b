// Paced synthetic sample producer standing in for the packet receiver.
// Invariants: tick n always covers [origin + n * rows_per_tick, ...), so withheld ticks leave holes.

use std::time::Duration;

use sample_core::Timestamp;
use tokio::task;
use tokio::time;
use tracing::{info, warn};

use crate::app::AppState;

/// Dense records where every lane of channel `c` at time `t` holds `c * 1000 + t`.
pub fn fill_synthetic_rows(
    rows: &mut Vec<f32>,
    begin: Timestamp,
    count: usize,
    channels: usize,
    row_width: usize,
) {
    rows.clear();
    for k in 0..count as i64 {
        let t = begin.raw() + k;
        for channel in 0..channels {
            let value = (channel as i64 * 1000 + t) as f32;
            rows.extend(std::iter::repeat(value).take(row_width));
        }
    }
}

/// Every `loss_every`-th tick is withheld; zero never withholds.
pub fn is_withheld(tick: u64, loss_every: u64) -> bool {
    loss_every > 0 && tick % loss_every == loss_every - 1
}

pub async fn producer_task(app_state: AppState) {
    let settings = app_state.settings.clone();
    let source = &settings.source;
    let rows_per_tick = source.rows_per_tick;
    let mut shutdown_rx = app_state.shutdown_rx();
    let mut interval = time::interval(Duration::from_millis(source.tick_ms));
    let mut rows = Vec::with_capacity(rows_per_tick * settings.ring.record_width());
    let mut next_time = app_state.ring.write_end();
    let mut tick: u64 = 0;

    info!(
        rows_per_tick,
        tick_ms = source.tick_ms,
        loss_every = source.loss_every,
        origin = %next_time,
        "producer started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.wait_for(|stopped| *stopped) => break,
        }

        let begin = next_time;
        next_time += rows_per_tick as i64;
        let withheld = is_withheld(tick, source.loss_every);
        tick += 1;

        if withheld {
            let mut store = app_state.store.write().await;
            store.producer.ticks += 1;
            store.producer.ticks_withheld += 1;
            store.producer.next_time = next_time;
            continue;
        }

        fill_synthetic_rows(&mut rows, begin, rows_per_tick, settings.ring.channels, settings.ring.row_width);
        let ring = app_state.ring.clone();
        let joined = task::spawn_blocking(move || {
            let accepted = ring.write_rows(begin, &rows);
            (rows, accepted)
        })
        .await;

        let accepted = match joined {
            Ok((returned, accepted)) => {
                rows = returned;
                accepted
            }
            Err(err) => {
                warn!(?err, "producer write task failed");
                break;
            }
        };
        match accepted {
            Ok(accepted) => {
                let mut store = app_state.store.write().await;
                store.producer.ticks += 1;
                store.producer.rows_offered += rows_per_tick as u64;
                store.producer.rows_accepted += accepted as u64;
                store.producer.next_time = next_time;
            }
            Err(err) => {
                warn!(%err, "producer write rejected");
                break;
            }
        }
        if app_state.ring.is_shut_down() {
            break;
        }
    }

    let producer = app_state.store.read().await.producer.clone();
    info!(
        ticks = producer.ticks,
        withheld = producer.ticks_withheld,
        offered = producer.rows_offered,
        accepted = producer.rows_accepted,
        "producer stopped"
    );
}
