// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::{Tick, TickSource, micros_to_tick};

/// Microseconds of `CLOCK_MONOTONIC`, wrapped to 32 bits.
///
/// GPIO line events are stamped with the same clock, so a tick read here and
/// an edge timestamp are directly comparable.
pub struct MonotonicTickSource;

impl MonotonicTickSource {
    pub fn new() -> Self {
        Self
    }

    pub fn micros_since_boot() -> u128 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // CLOCK_MONOTONIC is always available on Linux; on failure ts stays zero.
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }
        ts.tv_sec as u128 * 1_000_000 + ts.tv_nsec as u128 / 1_000
    }
}

impl TickSource for MonotonicTickSource {
    fn current_tick(&self) -> Tick {
        micros_to_tick(Self::micros_since_boot())
    }

    fn description(&self) -> &str {
        "CLOCK_MONOTONIC (us, wrapping)"
    }
}
