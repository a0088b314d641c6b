// Write/read cursor coordination over a circular index space.
// Invariants: R <= W; the writer never stores past R - history + capacity;
// every wait is released by shutdown.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::timestamp::Timestamp;

/// Chunk of a write span granted by [`WindowLock::write_lock`].
///
/// `begin` is past the requested begin when part of the span was already
/// exposed to a reader. An empty grant (`begin == end`) means nothing is left
/// to store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteGrant {
    pub begin: Timestamp,
    pub end: Timestamp,
}

/// What a reader was granted by [`WindowLock::read_lock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadGrant {
    /// First time the reader may consume. Greater than the requested end when
    /// the whole span has expired.
    pub begin: Timestamp,
    /// Read cursor before this grant. A grant that starts after it skips
    /// `[previous_end, begin)`.
    pub previous_end: Timestamp,
    /// Writer cursor when the grant was made.
    pub write_end: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WindowSnapshot {
    pub write_end: Timestamp,
    pub read_end: Timestamp,
    pub exposed: Timestamp,
    pub writing: bool,
    pub shut_down: bool,
}

#[derive(Debug)]
struct WindowState {
    write_end: Timestamp,
    read_end: Timestamp,
    exposed: Timestamp,
    grant: Option<(Timestamp, Timestamp)>,
    shut_down: bool,
}

/// Single-writer, single-reader window over an unbounded time axis mapped
/// onto `capacity` slots.
///
/// The writer blocks when publishing would reuse a slot the reader still owns;
/// the reader blocks until the writer is `delay` past the end of its span.
/// Spans the reader has already exposed are closed to the writer.
#[derive(Debug)]
pub struct WindowLock {
    capacity: i64,
    history: i64,
    delay: i64,
    read_wait: Option<Duration>,
    state: Mutex<WindowState>,
    data_ready: Condvar,
    space_ready: Condvar,
}

impl WindowLock {
    pub fn new(
        origin: Timestamp,
        capacity: usize,
        history: usize,
        delay: usize,
        read_wait: Option<Duration>,
    ) -> Self {
        Self {
            capacity: capacity as i64,
            history: history as i64,
            delay: delay as i64,
            read_wait,
            state: Mutex::new(WindowState {
                write_end: origin,
                read_end: origin,
                exposed: origin,
                grant: None,
                shut_down: false,
            }),
            data_ready: Condvar::new(),
            space_ready: Condvar::new(),
        }
    }

    /// Reserve the next writable chunk of `[begin, end)`.
    ///
    /// Blocks only while no slot after the exposed span is free. The grant may
    /// stop short of `end` at the space ceiling; the caller stores it, unlocks
    /// and asks again from `grant.end`. Returns `None` once shut down.
    pub fn write_lock(&self, begin: Timestamp, end: Timestamp) -> Option<WriteGrant> {
        let mut state = self.state.lock();

        // Begins are non-decreasing, so nothing before `begin` will ever arrive.
        if begin > state.write_end {
            state.write_end = begin;
            self.data_ready.notify_all();
        }

        loop {
            if state.shut_down {
                return None;
            }
            let effective = begin.max(state.exposed);
            if effective >= end {
                return Some(WriteGrant { begin: end, end });
            }
            let ceiling = self.space_ceiling(&state);
            if ceiling > effective {
                let grant = WriteGrant {
                    begin: effective,
                    end: end.min(ceiling),
                };
                state.grant = Some((grant.begin, grant.end));
                return Some(grant);
            }
            self.space_ready.wait(&mut state);
        }
    }

    pub fn write_unlock(&self, end: Timestamp) {
        let mut state = self.state.lock();
        state.write_end = state.write_end.max(end);
        state.grant = None;
        self.data_ready.notify_all();
    }

    /// Reserve `[begin, end)` for reading, waiting for the writer to get
    /// `delay` past `end` (bounded by the configured read wait).
    pub fn read_lock(&self, begin: Timestamp, end: Timestamp) -> Option<ReadGrant> {
        self.acquire_read(begin, end, true)
    }

    /// Like [`read_lock`](Self::read_lock) but never waits for unproduced data.
    pub fn try_read_lock(&self, begin: Timestamp, end: Timestamp) -> Option<ReadGrant> {
        self.acquire_read(begin, end, false)
    }

    fn acquire_read(&self, begin: Timestamp, end: Timestamp, wait_for_data: bool) -> Option<ReadGrant> {
        let mut state = self.state.lock();

        if wait_for_data {
            // Past the ceiling the writer stalls on us, so waiting longer cannot help.
            let target = (end + self.delay).min(self.space_ceiling(&state));
            let deadline = self.read_wait.map(|wait| Instant::now() + wait);
            while !state.shut_down && state.write_end < target {
                match deadline {
                    Some(deadline) => {
                        if self.data_ready.wait_until(&mut state, deadline).timed_out() {
                            break;
                        }
                    }
                    None => self.data_ready.wait(&mut state),
                }
            }
        }

        // An in-flight write below `end` may still be filling slots we are about to consume.
        while !state.shut_down && state.grant.map_or(false, |(grant_begin, _)| grant_begin < end) {
            self.data_ready.wait(&mut state);
        }
        if state.shut_down {
            return None;
        }

        let floor = state.read_end - self.history;
        state.exposed = state.exposed.max(end);
        Some(ReadGrant {
            begin: begin.max(floor),
            previous_end: state.read_end,
            write_end: state.write_end,
        })
    }

    /// First time the writer may not store at, given the current read cursor.
    fn space_ceiling(&self, state: &WindowState) -> Timestamp {
        state.read_end - self.history + self.capacity
    }

    pub fn read_unlock(&self, end: Timestamp) {
        let mut state = self.state.lock();
        state.read_end = state.read_end.max(end);
        state.write_end = state.write_end.max(state.read_end);
        self.space_ready.notify_all();
        self.data_ready.notify_all();
    }

    pub fn read_start(&self) -> Timestamp {
        self.state.lock().read_end
    }

    pub fn write_end(&self) -> Timestamp {
        self.state.lock().write_end
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        let state = self.state.lock();
        WindowSnapshot {
            write_end: state.write_end,
            read_end: state.read_end,
            exposed: state.exposed,
            writing: state.grant.is_some(),
            shut_down: state.shut_down,
        }
    }

    /// Wake every waiter; in-flight and later lock calls return `None`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shut_down = true;
        self.data_ready.notify_all();
        self.space_ready.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}
