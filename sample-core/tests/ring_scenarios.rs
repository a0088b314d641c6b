// End-to-end ring behaviour: echo, loss accounting, wraparound, and shutdown.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sample_core::{ReadOutcome, RingConfig, RingError, SampleRingBuffer, TimeBase, Timestamp};

fn ts(raw: i64) -> Timestamp {
    Timestamp::from_raw(raw)
}

fn config(capacity: usize, channels: usize, history: usize, delay: usize) -> RingConfig {
    RingConfig {
        capacity,
        channels,
        row_width: 1,
        history,
        delay,
        read_wait_ms: Some(0),
    }
}

fn ring(config: RingConfig) -> SampleRingBuffer<f32> {
    SampleRingBuffer::new(config, TimeBase::new(16).unwrap()).unwrap()
}

/// Dense records where every lane of channel `c` at time `t` holds `c * 1000 + t`.
fn synthetic_rows(begin: i64, count: usize, channels: usize, row_width: usize) -> Vec<f32> {
    let mut rows = Vec::with_capacity(count * channels * row_width);
    for k in 0..count as i64 {
        for channel in 0..channels {
            let value = (channel as i64 * 1000 + begin + k) as f32;
            rows.extend(std::iter::repeat(value).take(row_width));
        }
    }
    rows
}

fn expected_lane(channel: usize, begin: i64, count: usize, row_width: usize) -> Vec<f32> {
    (begin..begin + count as i64)
        .flat_map(|t| std::iter::repeat((channel as i64 * 1000 + t) as f32).take(row_width))
        .collect()
}

#[test]
fn contiguous_writes_echo_exactly() {
    let config = RingConfig {
        row_width: 3,
        ..config(64, 3, 8, 0)
    };
    let ring = ring(config);

    let mut t = 0i64;
    for count in [1usize, 7, 16, 5, 30, 2] {
        let rows = synthetic_rows(t, count, 3, 3);
        assert_eq!(ring.write_rows(ts(t), &rows), Ok(count));

        let (lanes, outcome) = ring.read_lanes(ts(t), count).unwrap();
        assert_eq!(outcome, ReadOutcome { accepted: count, invalid: 0 });
        for (channel, lane) in lanes.iter().enumerate() {
            assert_eq!(lane, &expected_lane(channel, t, count, 3));
        }
        t += count as i64;
    }
    assert_eq!(ring.dropped(), 0);
    assert_eq!(ring.gaps(), 0);
}

#[test]
fn write_behind_reader_is_fully_dropped() {
    let ring = ring(config(64, 2, 8, 0));
    ring.write_rows(ts(0), &synthetic_rows(0, 20, 2, 1)).unwrap();
    ring.read_lanes(ts(0), 20).unwrap();

    assert_eq!(ring.write_rows(ts(5), &synthetic_rows(5, 10, 2, 1)), Ok(0));
    assert_eq!(ring.dropped(), 10);

    // Straddling the read cursor keeps only the tail.
    assert_eq!(ring.write_rows(ts(15), &synthetic_rows(15, 10, 2, 1)), Ok(5));
    assert_eq!(ring.dropped(), 15);
    let (lanes, outcome) = ring.read_lanes(ts(20), 5).unwrap();
    assert_eq!(outcome.invalid, 0);
    assert_eq!(lanes[1], expected_lane(1, 20, 5, 1));
}

#[test]
fn unwritten_span_reads_as_zeros() {
    let ring = ring(config(64, 2, 8, 0));
    let (lanes, outcome) = ring.read_lanes(ts(0), 12).unwrap();
    assert_eq!(outcome, ReadOutcome { accepted: 12, invalid: 12 });
    assert!(lanes.iter().all(|lane| lane.iter().all(|&v| v == 0.0)));
    assert_eq!(ring.gaps(), 12);
}

#[test]
fn second_read_of_same_span_is_invalid() {
    let ring = ring(config(64, 1, 8, 0));
    ring.write_rows(ts(0), &synthetic_rows(0, 4, 1, 1)).unwrap();

    let (_, first) = ring.read_lanes(ts(0), 4).unwrap();
    assert_eq!(first.invalid, 0);

    let (lanes, second) = ring.read_lanes(ts(0), 4).unwrap();
    assert_eq!(second.invalid, 4);
    assert_eq!(lanes[0], vec![0.0; 4]);
}

#[test]
fn writer_blocks_instead_of_overwriting_unread_slots() {
    let ring = Arc::new(ring(RingConfig {
        read_wait_ms: None,
        ..config(8, 1, 0, 0)
    }));
    ring.write_rows(ts(0), &synthetic_rows(0, 8, 1, 1)).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let writer = {
        let ring = ring.clone();
        thread::spawn(move || {
            // t = 8..12 share slots with the unread t = 0..4.
            let accepted = ring.write_rows(ts(8), &synthetic_rows(8, 4, 1, 1));
            done_tx.send(accepted).unwrap();
        })
    };

    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
    let (lanes, outcome) = ring.read_lanes(ts(0), 4).unwrap();
    assert_eq!(outcome.invalid, 0);
    assert_eq!(lanes[0], expected_lane(0, 0, 4, 1));

    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(4));
    writer.join().unwrap();

    let (lanes, outcome) = ring.read_lanes(ts(4), 8).unwrap();
    assert_eq!(outcome.invalid, 0);
    assert_eq!(lanes[0], expected_lane(0, 4, 8, 1));
    assert_eq!(ring.dropped(), 0);
}

#[test]
fn two_channel_echo_then_empty_window() {
    let ring = ring(config(1000, 2, 100, 0));
    assert_eq!(ring.write_rows(ts(0), &synthetic_rows(0, 500, 2, 1)), Ok(500));

    let (lanes, outcome) = ring.read_lanes(ts(0), 500).unwrap();
    assert_eq!(outcome, ReadOutcome { accepted: 500, invalid: 0 });
    assert_eq!(lanes[0], expected_lane(0, 0, 500, 1));
    assert_eq!(lanes[1], expected_lane(1, 0, 500, 1));
    assert_eq!(lanes[1][499], 1499.0);

    let (lanes, outcome) = ring.read_lanes(ts(500), 100).unwrap();
    assert_eq!(outcome, ReadOutcome { accepted: 100, invalid: 100 });
    assert!(lanes.iter().all(|lane| lane.iter().all(|&v| v == 0.0)));
}

#[test]
fn start_read_skips_to_block_boundary() {
    let time_base = TimeBase::new(16).unwrap();
    let ring: SampleRingBuffer<f32> =
        SampleRingBuffer::with_origin(config(64, 1, 16, 0), time_base, ts(3)).unwrap();

    let boundary = ring.start_read();
    assert_eq!(boundary, ts(16));
    assert_eq!(ring.read_start(), ts(16));

    let (_, outcome) = ring.read_lanes(ts(4), 6).unwrap();
    assert_eq!(outcome.invalid, 6);
}

#[test]
fn start_read_discards_backlog_before_boundary() {
    let time_base = TimeBase::new(16).unwrap();
    let ring: SampleRingBuffer<f32> =
        SampleRingBuffer::with_origin(config(64, 1, 16, 0), time_base, ts(3)).unwrap();
    ring.write_rows(ts(3), &synthetic_rows(3, 20, 1, 1)).unwrap();

    assert_eq!(ring.start_read(), ts(16));
    assert_eq!(ring.gaps(), 0);

    let (lanes, outcome) = ring.read_lanes(ts(4), 6).unwrap();
    assert_eq!(outcome.invalid, 6);
    assert_eq!(lanes[0], vec![0.0; 6]);

    // Rows written past the boundary survive the discard.
    let (lanes, outcome) = ring.read_lanes(ts(16), 7).unwrap();
    assert_eq!(outcome.invalid, 0);
    assert_eq!(lanes[0], expected_lane(0, 16, 7, 1));
}

#[test]
fn start_read_on_boundary_keeps_cursor() {
    let ring = ring(config(64, 1, 8, 0));
    ring.write_rows(ts(0), &synthetic_rows(0, 16, 1, 1)).unwrap();
    ring.read_lanes(ts(0), 16).unwrap();
    assert_eq!(ring.start_read(), ts(16));
}

#[test]
fn start_read_with_short_history_reports_skipped_rows_invalid() {
    let time_base = TimeBase::new(256).unwrap();
    let ring: SampleRingBuffer<f32> =
        SampleRingBuffer::with_origin(config(1024, 1, 8, 0), time_base, ts(3)).unwrap();
    ring.write_rows(ts(3), &synthetic_rows(3, 197, 1, 1)).unwrap();

    assert_eq!(ring.start_read(), ts(256));

    // [4, 10) is far behind the history floor but was produced, so it is a gap.
    let (lanes, outcome) = ring.read_lanes(ts(4), 6).unwrap();
    assert_eq!(outcome, ReadOutcome { accepted: 0, invalid: 6 });
    assert_eq!(lanes[0], vec![0.0; 6]);
    assert_eq!(ring.read_start(), ts(256));
}

#[test]
fn read_wholly_behind_history_is_a_gap() {
    let ring = ring(config(64, 1, 4, 0));
    ring.write_rows(ts(0), &synthetic_rows(0, 30, 1, 1)).unwrap();
    ring.read_lanes(ts(0), 30).unwrap();

    let (lanes, outcome) = ring.read_lanes(ts(10), 5).unwrap();
    assert_eq!(outcome, ReadOutcome { accepted: 0, invalid: 5 });
    assert_eq!(lanes[0], vec![0.0; 5]);
    assert_eq!(ring.gaps(), 5);
}

#[test]
fn read_behind_history_and_ahead_of_writer_halts() {
    let ring = ring(config(32, 1, 2, 8));
    ring.write_rows(ts(0), &synthetic_rows(0, 12, 1, 1)).unwrap();
    ring.read_lanes(ts(0), 10).unwrap();

    let err = ring.read_lanes(ts(5), 2).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, RingError::Expired { floor, .. } if floor == ts(8)));
}

#[test]
fn straddling_write_and_waiting_reader_both_finish() {
    let ring = Arc::new(ring(RingConfig {
        read_wait_ms: None,
        ..config(8, 1, 0, 0)
    }));

    // [2, 10) crosses the free space while the reader waits on [0, 4).
    let writer = {
        let ring = ring.clone();
        thread::spawn(move || ring.write_rows(ts(2), &synthetic_rows(2, 8, 1, 1)))
    };
    let reader = {
        let ring = ring.clone();
        thread::spawn(move || ring.read_lanes(ts(0), 4))
    };

    let (lanes, outcome) = reader.join().unwrap().unwrap();
    assert_eq!(outcome, ReadOutcome { accepted: 4, invalid: 2 });
    assert_eq!(lanes[0], vec![0.0, 0.0, 2.0, 3.0]);
    assert_eq!(writer.join().unwrap(), Ok(8));

    let (lanes, outcome) = ring.read_lanes(ts(4), 6).unwrap();
    assert_eq!(outcome.invalid, 0);
    assert_eq!(lanes[0], expected_lane(0, 4, 6, 1));
    assert_eq!(ring.dropped(), 0);
}

#[test]
fn reader_is_held_back_by_delay() {
    let ring = Arc::new(ring(RingConfig {
        read_wait_ms: None,
        ..config(64, 1, 0, 4)
    }));

    let (done_tx, done_rx) = mpsc::channel();
    let reader = {
        let ring = ring.clone();
        thread::spawn(move || {
            done_tx.send(ring.read_lanes(ts(0), 4)).unwrap();
        })
    };

    ring.write_rows(ts(0), &synthetic_rows(0, 4, 1, 1)).unwrap();
    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

    ring.write_rows(ts(4), &synthetic_rows(4, 4, 1, 1)).unwrap();
    let (lanes, outcome) = done_rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(outcome.invalid, 0);
    assert_eq!(lanes[0], expected_lane(0, 0, 4, 1));
    reader.join().unwrap();
}

#[test]
fn shutdown_unblocks_stuck_writer_and_reader() {
    let blocking = RingConfig {
        read_wait_ms: None,
        ..config(8, 1, 0, 0)
    };
    let full = Arc::new(ring(blocking.clone()));
    full.write_rows(ts(0), &synthetic_rows(0, 8, 1, 1)).unwrap();
    let empty = Arc::new(ring(blocking));

    // The writer needs the reader to free t < 8; the other ring's reader waits for t = 4.
    let writer = {
        let ring = full.clone();
        thread::spawn(move || ring.write_rows(ts(8), &synthetic_rows(8, 8, 1, 1)))
    };
    let reader = {
        let ring = empty.clone();
        thread::spawn(move || ring.read_lanes(ts(0), 4).map(|(_, outcome)| outcome))
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!writer.is_finished());
    assert!(!reader.is_finished());
    full.shutdown();
    empty.shutdown();

    assert_eq!(writer.join().unwrap(), Ok(0));
    assert_eq!(reader.join().unwrap(), Ok(ReadOutcome::default()));
    assert!(full.stats().shut_down);
}
