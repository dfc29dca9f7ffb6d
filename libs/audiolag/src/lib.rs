// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Round-trip audio latency measurement.
//!
//! A timing pulse leaves the rig (as a GPIO line-level edge, or as a burst of
//! audio written to a USB/HDMI/PCIe ALSA device), travels through the device
//! under test, and comes back on a GPIO input. The elapsed hardware ticks are
//! the latency sample.
//!
//! The pieces:
//!
//! - [`SignalEmitter`](core::SignalEmitter) produces the pulse and arms the shared [`SignalState`](core::SignalState)
//! - [`EdgeDetector`](core::EdgeDetector) runs on the GPIO callback thread and posts [`DetectorEvent`](core::DetectorEvent)s
//! - [`MeasurementSequencer`](core::MeasurementSequencer) paces the run with the adaptive [`IntervalPolicy`](core::IntervalPolicy)
//!
//! Hardware is reached through the [`GpioBackend`](core::GpioBackend) and
//! [`PcmBackend`](core::PcmBackend) traits. [`sim`] implements both in
//! software; the `rpi` feature enables the `rppal`/`alsa` implementations in
//! `linux`.

#![allow(clippy::new_without_default)]

pub mod core;
pub mod sim;

#[cfg(all(target_os = "linux", feature = "rpi"))]
pub mod linux;

pub use core::{
    CancelToken, ControlPanel, CsvExporter, DetectorEvent, EdgeDetector, EdgeEvent, GpioBackend,
    IntervalPolicy, LatencyError, Level, MeasurementMethod, MeasurementSequencer,
    MeasurementSeries, PcmBackend, PcmStream, Result, Rig, RigConfig, RunReport, RunStatus,
    RunningStats, SignalEmitter, SignalQuality, SignalState, Tick, TickSource, Transport,
    TransportKind,
};
