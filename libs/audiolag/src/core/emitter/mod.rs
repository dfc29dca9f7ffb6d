// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Signal emitters - one per transport family

mod line_level;
mod pcm;

pub use line_level::LineLevelEmitter;
pub use pcm::{PcmEmitter, PcmEmitterSettings};

use std::sync::Arc;

use crate::core::{Result, SignalState, TransportKind};

/// Stream parameters recorded next to every sample in the CSV export.
///
/// Line-level runs have no audio stream and report zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFormat {
    /// One period, in bytes.
    pub buffer_size: usize,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Produces a bounded timing signal on one output transport.
///
/// The emitter is responsible for moving the shared [`SignalState`] to
/// `OnTheWay` with the tick at which the signal actually left: the hardware
/// edge tick for GPIO, the tick after the first completed period write for
/// PCM.
pub trait SignalEmitter: Send {
    fn kind(&self) -> TransportKind;

    /// Acquire the output channel for a run.
    ///
    /// Fails with `TransportUnavailable` once every configured device id has
    /// been tried.
    fn open(&mut self, state: Arc<SignalState>) -> Result<StreamFormat>;

    /// Emit one signal. Returns once the signal has been handed to the
    /// hardware; the caller then waits out the interval.
    fn emit(&mut self) -> Result<()>;

    /// Release the output channel. Safe to call when not open.
    fn close(&mut self) -> Result<()>;
}
