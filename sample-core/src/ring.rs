// Per-channel sample ring keyed by absolute time, layered on WindowLock.
// Invariants: slot t mod capacity holds one owner time; a validity bit is consumed
// by the read that sees it, and spans the reader jumps over are cleared too.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::RingConfig;
use crate::error::RingError;
use crate::timestamp::{TimeBase, Timestamp};
use crate::window::WindowLock;

/// Result of one read of `count` rows.
///
/// `invalid` counts against the requested `count`, not against `accepted`:
/// rows skipped behind the history floor are zero-filled and invalid without
/// being accepted, so `invalid` may exceed `accepted`. Always
/// `invalid <= count`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReadOutcome {
    /// Rows served from the ring, i.e. `end - effective_begin`.
    pub accepted: usize,
    /// Rows zero-filled in the output: never written, already consumed, or
    /// skipped because they fell behind the retained history.
    pub invalid: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RingStats {
    pub capacity: usize,
    pub channels: usize,
    pub row_width: usize,
    pub write_end: Timestamp,
    pub read_end: Timestamp,
    pub written: u64,
    pub dropped: u64,
    pub read: u64,
    pub gaps: u64,
    pub shut_down: bool,
}

#[derive(Debug, Default)]
struct RingCounters {
    written: AtomicU64,
    dropped: AtomicU64,
    read: AtomicU64,
    gaps: AtomicU64,
}

#[derive(Debug)]
struct Slabs<T> {
    lanes: Vec<Vec<T>>,
    valid: Vec<bool>,
}

impl<T: Copy + Default> Slabs<T> {
    fn new(config: &RingConfig) -> Self {
        let lane_len = config.capacity * config.row_width;
        Self {
            lanes: (0..config.channels)
                .map(|_| vec![T::default(); lane_len])
                .collect(),
            valid: vec![false; config.capacity],
        }
    }

    fn capacity(&self) -> usize {
        self.valid.len()
    }

    fn store(&mut self, slot: usize, record: &[T], row_width: usize) {
        let range = slot * row_width..(slot + 1) * row_width;
        for (lane, values) in self.lanes.iter_mut().zip(record.chunks_exact(row_width)) {
            lane[range.clone()].copy_from_slice(values);
        }
        self.valid[slot] = true;
    }

    /// Clear validity for `[begin, end)`; returns how many set bits were dropped.
    fn clear(&mut self, begin: Timestamp, end: Timestamp) -> usize {
        let capacity = self.capacity();
        let span = begin.span_to(end).min(capacity);
        let mut cleared = 0;
        for k in 0..span {
            let slot = (begin + k as i64).slot(capacity);
            if self.valid[slot] {
                cleared += 1;
            }
            self.valid[slot] = false;
        }
        cleared
    }

    fn consume(
        &mut self,
        begin: Timestamp,
        real_begin: Timestamp,
        end: Timestamp,
        out: &mut [&mut [T]],
        row_width: usize,
    ) -> ReadOutcome {
        let capacity = self.capacity();
        let skipped = begin.span_to(real_begin);
        let accepted = real_begin.span_to(end);

        for lane in out.iter_mut() {
            lane[..skipped * row_width].fill(T::default());
        }

        if accepted > 0 {
            let first_slot = real_begin.slot(capacity);
            let head = accepted.min(capacity - first_slot);
            let tail = accepted - head;
            for (lane, slab) in out.iter_mut().zip(&self.lanes) {
                let dst = &mut lane[skipped * row_width..(skipped + accepted) * row_width];
                let (dst_head, dst_tail) = dst.split_at_mut(head * row_width);
                dst_head.copy_from_slice(&slab[first_slot * row_width..(first_slot + head) * row_width]);
                dst_tail.copy_from_slice(&slab[..tail * row_width]);
            }
        }

        let mut invalid = skipped;
        for k in 0..accepted {
            let slot = (real_begin + k as i64).slot(capacity);
            if !self.valid[slot] {
                let row = (skipped + k) * row_width;
                for lane in out.iter_mut() {
                    lane[row..row + row_width].fill(T::default());
                }
                invalid += 1;
            }
            self.valid[slot] = false;
        }

        ReadOutcome { accepted, invalid }
    }
}

/// Fixed-capacity multi-channel sample buffer between a real-time producer
/// and a windowed consumer.
///
/// Late writes are dropped and counted, reads of missing or expired rows are
/// zero-filled and counted, and the only fatal condition is a read whose whole
/// span has expired behind the retained history while the writer had not yet
/// got `delay` past it.
#[derive(Debug)]
pub struct SampleRingBuffer<T> {
    config: RingConfig,
    time_base: TimeBase,
    window: WindowLock,
    slabs: Mutex<Slabs<T>>,
    counters: RingCounters,
}

impl<T: Copy + Default> SampleRingBuffer<T> {
    pub fn new(config: RingConfig, time_base: TimeBase) -> Result<Self, RingError> {
        Self::with_origin(config, time_base, Timestamp::default())
    }

    /// Ring whose cursors start at `origin` instead of time zero.
    pub fn with_origin(
        config: RingConfig,
        time_base: TimeBase,
        origin: Timestamp,
    ) -> Result<Self, RingError> {
        config.validate()?;
        let window = WindowLock::new(
            origin,
            config.capacity,
            config.history,
            config.delay,
            config.read_wait(),
        );
        let slabs = Slabs::new(&config);
        info!(
            capacity = config.capacity,
            channels = config.channels,
            row_width = config.row_width,
            history = config.history,
            delay = config.delay,
            read_wait_ms = ?config.read_wait_ms,
            block_size = time_base.block_size(),
            %origin,
            "sample ring allocated"
        );
        Ok(Self {
            config,
            time_base,
            window,
            slabs: Mutex::new(slabs),
            counters: RingCounters::default(),
        })
    }

    /// Store `count` records starting at `begin`.
    ///
    /// Record `k` starts at `rows[k * stride]` and carries `channels` lanes of
    /// `row_width` values each. Returns how many records were accepted; the
    /// rest were already behind the reader and are counted as dropped.
    /// A span that crosses the free space is stored in chunks, so the reader
    /// can drain the first part while the rest waits. A shutdown mid-span
    /// returns the records stored so far.
    pub fn write(
        &self,
        begin: Timestamp,
        count: usize,
        rows: &[T],
        stride: usize,
    ) -> Result<usize, RingError> {
        let record_width = self.config.record_width();
        let limit = self.config.max_write_span();
        if count > limit {
            return Err(RingError::SpanTooLarge { count, limit });
        }
        if stride < record_width {
            return Err(RingError::ShapeMismatch {
                what: "write stride",
                expected: record_width,
                actual: stride,
            });
        }
        if count == 0 {
            return Ok(0);
        }
        let needed = (count - 1) * stride + record_width;
        if rows.len() < needed {
            return Err(RingError::ShapeMismatch {
                what: "write rows",
                expected: needed,
                actual: rows.len(),
            });
        }

        let end = begin + count as i64;
        let mut cursor = begin;
        let mut accepted = 0;
        while cursor < end {
            let Some(grant) = self.window.write_lock(cursor, end) else {
                break;
            };

            let dropped = cursor.span_to(grant.begin);
            if dropped > 0 {
                self.counters.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
                debug!(%cursor, real_begin = %grant.begin, dropped, "late rows dropped");
            }

            {
                let mut slabs = self.slabs.lock();
                let capacity = slabs.capacity();
                let first = begin.span_to(grant.begin);
                for k in first..first + grant.begin.span_to(grant.end) {
                    let offset = k * stride;
                    let t = begin + k as i64;
                    slabs.store(
                        t.slot(capacity),
                        &rows[offset..offset + record_width],
                        self.config.row_width,
                    );
                }
            }
            self.window.write_unlock(grant.end);

            let stored = grant.begin.span_to(grant.end);
            self.counters.written.fetch_add(stored as u64, Ordering::Relaxed);
            accepted += stored;
            cursor = grant.end;
        }
        Ok(accepted)
    }

    /// [`write`](Self::write) for densely packed records.
    pub fn write_rows(&self, begin: Timestamp, rows: &[T]) -> Result<usize, RingError> {
        let record_width = self.config.record_width();
        if rows.len() % record_width != 0 {
            return Err(RingError::ShapeMismatch {
                what: "write rows (whole records)",
                expected: (rows.len() / record_width + 1) * record_width,
                actual: rows.len(),
            });
        }
        self.write(begin, rows.len() / record_width, rows, record_width)
    }

    /// Copy `[begin, begin + count)` into `out`, one lane per channel.
    ///
    /// Each lane receives `count * row_width` values in time order. Missing,
    /// consumed or skipped rows are zero-filled and counted in `invalid`.
    /// After a shutdown the call returns an empty outcome and leaves `out` alone.
    pub fn read(
        &self,
        begin: Timestamp,
        count: usize,
        out: &mut [&mut [T]],
    ) -> Result<ReadOutcome, RingError> {
        let limit = self.config.max_read_span();
        if count > limit {
            return Err(RingError::SpanTooLarge { count, limit });
        }
        if out.len() != self.config.channels {
            return Err(RingError::ShapeMismatch {
                what: "read lanes",
                expected: self.config.channels,
                actual: out.len(),
            });
        }
        let needed = count * self.config.row_width;
        if let Some(lane) = out.iter().find(|lane| lane.len() < needed) {
            return Err(RingError::ShapeMismatch {
                what: "read lane",
                expected: needed,
                actual: lane.len(),
            });
        }

        let end = begin + count as i64;
        let Some(grant) = self.window.read_lock(begin, end) else {
            return Ok(ReadOutcome::default());
        };
        if grant.begin > end && grant.write_end < end + self.config.delay as i64 {
            self.window.read_unlock(end);
            error!(%begin, %end, floor = %grant.begin, "read span expired before it was produced");
            return Err(RingError::Expired {
                begin,
                end,
                floor: grant.begin,
            });
        }
        let real_begin = grant.begin.min(end);

        let outcome = {
            let mut slabs = self.slabs.lock();
            slabs.clear(grant.previous_end, real_begin);
            slabs.consume(begin, real_begin, end, out, self.config.row_width)
        };
        self.window.read_unlock(end);

        self.counters.read.fetch_add(count as u64, Ordering::Relaxed);
        if outcome.invalid > 0 {
            self.counters.gaps.fetch_add(outcome.invalid as u64, Ordering::Relaxed);
            debug!(%begin, count, invalid = outcome.invalid, "read found gaps");
        }
        Ok(outcome)
    }

    /// [`read`](Self::read) into freshly allocated lanes.
    pub fn read_lanes(
        &self,
        begin: Timestamp,
        count: usize,
    ) -> Result<(Vec<Vec<T>>, ReadOutcome), RingError> {
        let mut lanes = vec![vec![T::default(); count * self.config.row_width]; self.config.channels];
        let outcome = {
            let mut out: Vec<&mut [T]> = lanes.iter_mut().map(Vec::as_mut_slice).collect();
            self.read(begin, count, &mut out)?
        };
        Ok((lanes, outcome))
    }

    /// Align the read cursor to the next block boundary and return it.
    ///
    /// Any backlog before the boundary is discarded, so the writer can no
    /// longer fill it and a later read of it reports every row invalid.
    pub fn start_read(&self) -> Timestamp {
        let start = self.window.read_start();
        let boundary = self.time_base.align_up(start);
        if boundary > start {
            if let Some(grant) = self.window.try_read_lock(start, boundary) {
                let discarded = self
                    .slabs
                    .lock()
                    .clear(grant.previous_end.min(grant.begin), boundary);
                self.window.read_unlock(boundary);
                debug!(%start, %boundary, discarded, "read backlog discarded");
            }
        }
        info!(%start, %boundary, "read start aligned");
        boundary
    }

    /// Resynchronize the reader at `begin` without consuming rows at or after it.
    ///
    /// Returns the first obtainable time: `begin` itself, or the history floor
    /// when `begin` has already expired.
    pub fn start_read_at(&self, begin: Timestamp) -> Timestamp {
        let Some(grant) = self.window.try_read_lock(begin, begin) else {
            return begin;
        };
        if grant.begin > grant.previous_end {
            self.slabs.lock().clear(grant.previous_end, grant.begin);
        }
        self.window.read_unlock(begin);
        if grant.begin > begin {
            debug!(%begin, floor = %grant.begin, "resync point already expired");
        }
        grant.begin
    }
}

impl<T> SampleRingBuffer<T> {
    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn gaps(&self) -> u64 {
        self.counters.gaps.load(Ordering::Relaxed)
    }

    pub fn read_start(&self) -> Timestamp {
        self.window.read_start()
    }

    pub fn write_end(&self) -> Timestamp {
        self.window.write_end()
    }

    pub fn stats(&self) -> RingStats {
        let window = self.window.snapshot();
        RingStats {
            capacity: self.config.capacity,
            channels: self.config.channels,
            row_width: self.config.row_width,
            write_end: window.write_end,
            read_end: window.read_end,
            written: self.counters.written.load(Ordering::Relaxed),
            dropped: self.dropped(),
            read: self.counters.read.load(Ordering::Relaxed),
            gaps: self.gaps(),
            shut_down: window.shut_down,
        }
    }

    /// Release every blocked reader and writer; later calls return empty results.
    pub fn shutdown(&self) {
        self.window.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.window.is_shut_down()
    }
}

impl<T> Drop for SampleRingBuffer<T> {
    fn drop(&mut self) {
        info!(
            written = self.counters.written.load(Ordering::Relaxed),
            dropped = self.dropped(),
            read = self.counters.read.load(Ordering::Relaxed),
            gaps = self.gaps(),
            "sample ring released"
        );
    }
}
