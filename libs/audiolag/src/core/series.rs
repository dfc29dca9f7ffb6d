// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

/// Slot value for an iteration that never produced a valid capture.
pub const INVALID_SAMPLE: i64 = -1;

/// Latency samples of one run, in microseconds.
///
/// Fixed capacity; every slot starts as [`INVALID_SAMPLE`]. Captures fill
/// slots front to back in arrival order, so after a run the first
/// `valid_count` slots hold samples and the rest stay sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementSeries {
    slots: Vec<i64>,
    filled: usize,
}

impl MeasurementSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![INVALID_SAMPLE; capacity],
            filled: 0,
        }
    }

    /// Reinitialise every slot to the sentinel.
    pub fn reset(&mut self) {
        self.slots.fill(INVALID_SAMPLE);
        self.filled = 0;
    }

    /// Store a sample in the next free slot. Returns the slot index, or
    /// `None` when the series is already full.
    pub fn commit(&mut self, latency_us: u32) -> Option<usize> {
        let index = self.filled;
        let slot = self.slots.get_mut(index)?;
        *slot = i64::from(latency_us);
        self.filled += 1;
        Some(index)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn valid_count(&self) -> usize {
        self.filled
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// All slots, sentinel included.
    pub fn slots(&self) -> &[i64] {
        &self.slots
    }

    /// Only the captured samples.
    pub fn samples(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots[..self.filled].iter().map(|&s| s as u32)
    }
}

/// Incrementally maintained statistics over the valid samples of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningStats {
    valid_count: usize,
    max_latency_us: Option<u32>,
    min_latency_us: Option<u32>,
    sum_latency_us: u64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, latency_us: u32) {
        self.valid_count += 1;
        self.sum_latency_us += u64::from(latency_us);
        self.max_latency_us = Some(self.max_latency_us.map_or(latency_us, |m| m.max(latency_us)));
        self.min_latency_us = Some(self.min_latency_us.map_or(latency_us, |m| m.min(latency_us)));
    }

    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    /// `None` until the first valid sample.
    pub fn max_latency_us(&self) -> Option<u32> {
        self.max_latency_us
    }

    pub fn min_latency_us(&self) -> Option<u32> {
        self.min_latency_us
    }

    pub fn sum_latency_us(&self) -> u64 {
        self.sum_latency_us
    }

    /// Integer mean of the valid samples.
    pub fn avg_latency_us(&self) -> Option<u32> {
        if self.valid_count == 0 {
            return None;
        }
        Some((self.sum_latency_us / self.valid_count as u64) as u32)
    }
}
