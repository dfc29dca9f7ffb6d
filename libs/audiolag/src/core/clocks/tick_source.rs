// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Tick source - free-running microsecond counter
//!
//! Every timestamp in a latency sample is a hardware tick: microseconds since
//! some arbitrary epoch (boot, on the Pi), truncated to 32 bits. The counter
//! wraps from `u32::MAX` to 0 roughly every 71.6 minutes.

/// Microsecond tick, wraps at 2^32.
pub type Tick = u32;

/// Free-running microsecond counter shared by the emitter and the GPIO edge
/// callbacks.
///
/// ## Design
///
/// - **Same epoch as edge events**: ticks handed to edge callbacks and ticks
///   returned by `current_tick()` must be comparable
/// - **Wrapping**: implementations truncate, they never saturate
/// - **Thread-safe**: called from the sequencer thread and from callback
///   threads concurrently
pub trait TickSource: Send + Sync {
    /// Current tick.
    fn current_tick(&self) -> Tick;

    /// Human-readable description, used for logging.
    fn description(&self) -> &str;
}

/// Truncate a microsecond count to a wrapping tick.
#[inline]
pub fn micros_to_tick(micros: u128) -> Tick {
    (micros & u128::from(u32::MAX)) as Tick
}
