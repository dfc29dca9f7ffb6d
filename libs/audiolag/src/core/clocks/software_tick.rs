// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::{Tick, TickSource, micros_to_tick};
use std::time::Instant;

/// Tick source backed by `Instant`, starting at a configurable tick.
///
/// Starting close to `u32::MAX` lets tests and simulations exercise the
/// wraparound path without waiting 71 minutes.
pub struct SoftwareTickSource {
    start_time: Instant,
    start_tick: Tick,
    description: String,
}

impl SoftwareTickSource {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(start_tick: Tick) -> Self {
        Self {
            start_time: Instant::now(),
            start_tick,
            description: format!("Software Tick Source (start {})", start_tick),
        }
    }

    pub fn reset(&mut self) {
        self.start_time = Instant::now();
    }
}

impl Default for SoftwareTickSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SoftwareTickSource {
    fn current_tick(&self) -> Tick {
        let elapsed = micros_to_tick(self.start_time.elapsed().as_micros());
        self.start_tick.wrapping_add(elapsed)
    }

    fn description(&self) -> &str {
        &self.description
    }
}
