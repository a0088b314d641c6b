// Application state and shared stream bookkeeping for the service.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use sample_core::{RingError, SampleRingBuffer};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::buffers::History;
use crate::config::StationSettings;
use crate::constants::{BROADCAST_CAPACITY, WINDOW_HISTORY};
use crate::model::{ConsumerTotals, ProducerTotals, StatsSnapshot, WindowSummary};

#[derive(Clone)]
pub struct AppState {
    pub tx: broadcast::Sender<String>,
    pub sequence: Arc<AtomicU64>,
    pub start_instant: Instant,
    pub settings: Arc<StationSettings>,
    pub ring: Arc<SampleRingBuffer<f32>>,
    pub store: Arc<RwLock<StreamStore>>,
    pub shutdown_tx: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(settings: StationSettings) -> Result<Self, RingError> {
        let ring = SampleRingBuffer::new(settings.ring.clone(), settings.time_base)?;
        let (tx, _) = broadcast::channel::<String>(BROADCAST_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            tx,
            sequence: Arc::new(AtomicU64::new(0)),
            start_instant: Instant::now(),
            settings: Arc::new(settings),
            ring: Arc::new(ring),
            store: Arc::new(RwLock::new(StreamStore::new())),
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_instant.elapsed().as_millis() as u64
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Release the ring's blocked callers, then tell every task to stop.
    pub fn trigger_shutdown(&self, reason: &str) {
        self.ring.shutdown();
        let already = self.shutdown_tx.send_replace(true);
        if !already {
            info!(reason, "shutdown requested");
        }
    }

    /// Record a fatal stream fault and stop the pipeline.
    pub async fn halt(&self, err: &RingError) {
        warn!(%err, "stream halted");
        self.store.write().await.halted = Some(err.to_string());
        self.trigger_shutdown("stream halted");
    }

    pub async fn stats_snapshot(&self) -> StatsSnapshot {
        let ring = self.ring.stats();
        let store = self.store.read().await;
        StatsSnapshot {
            ring,
            producer: store.producer.clone(),
            consumer: store.consumer.clone(),
            halted: store.halted.clone(),
        }
    }
}

pub struct StreamStore {
    pub windows: History<WindowSummary>,
    pub producer: ProducerTotals,
    pub consumer: ConsumerTotals,
    pub halted: Option<String>,
}

impl StreamStore {
    pub fn new() -> Self {
        Self {
            windows: History::new(WINDOW_HISTORY),
            producer: ProducerTotals::default(),
            consumer: ConsumerTotals::default(),
            halted: None,
        }
    }

    pub fn record_window(&mut self, summary: WindowSummary) {
        self.consumer.windows += 1;
        self.consumer.rows += summary.count as u64;
        self.consumer.invalid_rows += summary.invalid as u64;
        if !summary.is_complete() {
            self.consumer.incomplete_windows += 1;
        }
        self.consumer.next_begin = Some(summary.begin + summary.count as i64);
        self.windows.push(summary);
    }
}

impl Default for StreamStore {
    fn default() -> Self {
        Self::new()
    }
}
