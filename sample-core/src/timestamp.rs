// Absolute sample-count time and its block granularity.
// Invariants: Timestamp is a plain i64 sample index; decomposition always goes through a TimeBase.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Granularity used to split a [`Timestamp`] into `(sequence_id, block_id)`.
///
/// Built once per observation and handed to whatever needs block alignment,
/// so nothing reads an unset global.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    block_size: i64,
}

impl TimeBase {
    pub fn new(block_size: i64) -> Result<Self, ConfigError> {
        if block_size <= 0 {
            return Err(ConfigError::InvalidBlockSize(block_size));
        }
        Ok(Self { block_size })
    }

    pub fn block_size(&self) -> i64 {
        self.block_size
    }

    /// Smallest block boundary at or after `t`.
    pub fn align_up(&self, t: Timestamp) -> Timestamp {
        let rem = t.0.rem_euclid(self.block_size);
        if rem == 0 {
            t
        } else {
            Timestamp(t.0 + (self.block_size - rem))
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn from_parts(time_base: &TimeBase, sequence_id: i64, block_id: i64) -> Self {
        Self(sequence_id * time_base.block_size + block_id)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn sequence_id(self, time_base: &TimeBase) -> i64 {
        self.0.div_euclid(time_base.block_size)
    }

    pub fn block_id(self, time_base: &TimeBase) -> i64 {
        self.0.rem_euclid(time_base.block_size)
    }

    /// Physical slot of this time in a ring of `capacity` slots.
    pub fn slot(self, capacity: usize) -> usize {
        self.0.rem_euclid(capacity as i64) as usize
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn prev(self) -> Self {
        Self(self.0 - 1)
    }

    /// Number of time units in `[self, end)`, zero when `end` is not after `self`.
    pub fn span_to(self, end: Timestamp) -> usize {
        (end.0 - self.0).max(0) as usize
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<Timestamp> for i64 {
    fn from(t: Timestamp) -> Self {
        t.0
    }
}

impl Add<i64> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: i64) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}

impl Add<Timestamp> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl Sub<i64> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: i64) -> Timestamp {
        Timestamp(self.0 - rhs)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = i64;

    fn sub(self, rhs: Timestamp) -> i64 {
        self.0 - rhs.0
    }
}

impl AddAssign<i64> for Timestamp {
    fn add_assign(&mut self, rhs: i64) {
        self.0 += rhs;
    }
}

impl SubAssign<i64> for Timestamp {
    fn sub_assign(&mut self, rhs: i64) {
        self.0 -= rhs;
    }
}

impl PartialEq<i64> for Timestamp {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<i64> for Timestamp {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        Some(self.0.cmp(other))
    }
}

impl PartialEq<Timestamp> for i64 {
    fn eq(&self, other: &Timestamp) -> bool {
        *self == other.0
    }
}

impl PartialOrd<Timestamp> for i64 {
    fn partial_cmp(&self, other: &Timestamp) -> Option<Ordering> {
        Some(self.cmp(&other.0))
    }
}
