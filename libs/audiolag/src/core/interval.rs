// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Adaptive pacing between timing signals.
//!
//! The next signal must not leave before the previous one can have come back,
//! or its edge is read as a near-zero latency for the new signal. After the
//! first capture the interval tracks the largest latency seen so far plus a
//! margin of `max / i` that shrinks as more samples arrive. A floor keeps
//! amplifiers in the signal path that need a minimum off-time working.

use std::time::Duration;

use crate::core::{LatencyError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalPolicy {
    start_interval_s: f64,
    minimum_interval_s: f64,
}

impl IntervalPolicy {
    pub const DEFAULT_START_INTERVAL_S: f64 = 0.1;
    pub const DEFAULT_MINIMUM_INTERVAL_S: f64 = 0.02;

    /// Longest accepted start or minimum interval. The tick counter wraps
    /// after roughly 4295 s, so longer pacing cannot be timed anyway.
    pub const MAX_INTERVAL_S: f64 = 3600.0;

    pub fn new(start_interval_s: f64, minimum_interval_s: f64) -> Result<Self> {
        Ok(Self {
            start_interval_s: seconds_setting(
                "start interval",
                start_interval_s,
                Self::MAX_INTERVAL_S,
            )?,
            minimum_interval_s: seconds_setting(
                "minimum interval",
                minimum_interval_s,
                Self::MAX_INTERVAL_S,
            )?,
        })
    }

    pub fn start_interval(&self) -> Duration {
        Duration::from_secs_f64(self.start_interval_s)
    }

    pub fn minimum_interval(&self) -> Duration {
        Duration::from_secs_f64(self.minimum_interval_s)
    }

    /// Interval in seconds to wait after emitting signal `iteration`.
    ///
    /// The margin uses floating-point `1 / iteration`; integer division
    /// would drop it to zero from the second iteration on.
    pub fn signal_interval_s(&self, iteration: usize, max_latency_us: Option<u32>) -> f64 {
        let max_latency_us = match max_latency_us {
            Some(max) if iteration > 0 => max,
            _ => return self.start_interval_s,
        };

        let max_latency_s = f64::from(max_latency_us) / 1_000_000.0;
        let margin_s = max_latency_s / iteration as f64;
        if max_latency_s <= self.minimum_interval_s {
            self.minimum_interval_s + margin_s
        } else {
            max_latency_s + margin_s
        }
    }

    pub fn signal_interval(&self, iteration: usize, max_latency_us: Option<u32>) -> Duration {
        Duration::from_secs_f64(self.signal_interval_s(iteration, max_latency_us))
    }
}

/// Check a duration given in seconds: finite, positive and at most `max_s`.
pub(crate) fn seconds_setting(name: &str, value: f64, max_s: f64) -> Result<f64> {
    if !(value.is_finite() && value > 0.0) {
        return Err(LatencyError::Configuration(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    if value > max_s || Duration::try_from_secs_f64(value).is_err() {
        return Err(LatencyError::Configuration(format!(
            "{} must be at most {} s, got {}",
            name, max_s, value
        )));
    }
    Ok(value)
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            start_interval_s: Self::DEFAULT_START_INTERVAL_S,
            minimum_interval_s: Self::DEFAULT_MINIMUM_INTERVAL_S,
        }
    }
}
