// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Measurement sequencer - drives one run of N signals
//!
//! Per iteration: drain detector events, compute the interval, disarm, emit,
//! sleep. The sleep is the capture timeout; an edge that has not arrived by
//! the next iteration's disarm is a missed sample and only shows up as a
//! lower `valid_count`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use serde::{Deserialize, Serialize};

use crate::core::config::CountConfig;
use crate::core::{
    DetectorEvent, Direction, EdgeDetector, GpioBackend, IntervalPolicy, MeasurementSeries,
    PinNumber, Result, RigConfig, RunningStats, SignalEmitter, SignalState, StreamFormat,
    TransportKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementMethod {
    /// Short run at the fixed start interval, judged by its valid count.
    Calibrate,
    /// Full run with the adaptive interval; persisted on completion.
    Measure,
}

impl fmt::Display for MeasurementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementMethod::Calibrate => write!(f, "calibration"),
            MeasurementMethod::Measure => write!(f, "measurement"),
        }
    }
}

/// Cooperative cancellation, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Stopped before the last iteration; never persisted.
    Cancelled { completed_iterations: usize },
}

/// Everything a finished (or cancelled) run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub method: MeasurementMethod,
    pub transport: TransportKind,
    pub status: RunStatus,
    pub series: MeasurementSeries,
    pub stats: RunningStats,
    /// Interval slept after each emitted signal.
    pub intervals: Vec<Duration>,
    pub stream_format: StreamFormat,
    /// Edges that ended a signal with a negative latency (tick wraparound).
    pub rejected_samples: usize,
    /// Bounce, falling and spurious edges.
    pub ignored_edges: usize,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn valid_count(&self) -> usize {
        self.series.valid_count()
    }
}

/// Per-run context: the shared signal state, the detector's event queue, and
/// the series the sequencer alone writes to.
struct MeasurementRun {
    method: MeasurementMethod,
    state: Arc<SignalState>,
    events: Receiver<DetectorEvent>,
    series: MeasurementSeries,
    stats: RunningStats,
    intervals: Vec<Duration>,
    rejected_samples: usize,
    ignored_edges: usize,
}

impl MeasurementRun {
    fn new(
        method: MeasurementMethod,
        iterations: usize,
        state: Arc<SignalState>,
        events: Receiver<DetectorEvent>,
    ) -> Self {
        Self {
            method,
            state,
            events,
            series: MeasurementSeries::new(iterations),
            stats: RunningStats::new(),
            intervals: Vec::with_capacity(iterations),
            rejected_samples: 0,
            ignored_edges: 0,
        }
    }

    /// Apply everything the detector posted since the last drain.
    fn drain_events(&mut self) {
        for event in self.events.try_iter() {
            match event {
                DetectorEvent::SampleCaptured { latency_us, .. } => {
                    match self.series.commit(latency_us) {
                        Some(slot) => {
                            self.stats.record(latency_us);
                            tracing::debug!(slot, latency_us, "sample captured");
                        }
                        None => {
                            tracing::warn!(latency_us, "series full, sample dropped");
                        }
                    }
                }
                DetectorEvent::SampleRejected {
                    start_tick,
                    end_tick,
                } => {
                    self.rejected_samples += 1;
                    tracing::warn!(start_tick, end_tick, "negative latency, sample dropped");
                }
                DetectorEvent::EdgeIgnored { .. } => {
                    self.ignored_edges += 1;
                }
            }
        }
    }

    fn into_report(
        self,
        transport: TransportKind,
        status: RunStatus,
        stream_format: StreamFormat,
    ) -> RunReport {
        RunReport {
            method: self.method,
            transport,
            status,
            series: self.series,
            stats: self.stats,
            intervals: self.intervals,
            stream_format,
            rejected_samples: self.rejected_samples,
            ignored_edges: self.ignored_edges,
        }
    }
}

pub struct MeasurementSequencer {
    gpio: Arc<dyn GpioBackend>,
    line_in: PinNumber,
    policy: IntervalPolicy,
    counts: CountConfig,
}

impl MeasurementSequencer {
    pub fn new(
        gpio: Arc<dyn GpioBackend>,
        line_in: PinNumber,
        policy: IntervalPolicy,
        counts: CountConfig,
    ) -> Self {
        Self {
            gpio,
            line_in,
            policy,
            counts,
        }
    }

    pub fn from_config(gpio: Arc<dyn GpioBackend>, config: &RigConfig) -> Result<Self> {
        Ok(Self::new(
            gpio,
            config.pins.line_in,
            config.interval_policy()?,
            config.counts.clone(),
        ))
    }

    pub fn iterations(&self, method: MeasurementMethod) -> usize {
        match method {
            MeasurementMethod::Measure => self.counts.measurements,
            MeasurementMethod::Calibrate => self.counts.calibration_measurements,
        }
    }

    /// Run `method` through `emitter`.
    ///
    /// Opens the emitter, registers the detector on line-in, and releases
    /// both on every exit path. `TransportUnavailable` from the emitter
    /// aborts the run and is returned as-is.
    pub fn run(
        &self,
        emitter: &mut dyn SignalEmitter,
        method: MeasurementMethod,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        let iterations = self.iterations(method);
        let transport = emitter.kind();
        let state = Arc::new(SignalState::new());
        let (tx, rx) = unbounded();
        let mut run = MeasurementRun::new(method, iterations, Arc::clone(&state), rx);

        tracing::info!(%transport, %method, iterations, "Starting run");

        self.gpio.set_direction(self.line_in, Direction::Input)?;
        let detector = EdgeDetector::new(state, tx);
        self.gpio.on_rising_edge(
            self.line_in,
            Box::new(move |edge| {
                detector.on_edge(edge);
            }),
        )?;

        let outcome = emitter.open(Arc::clone(&run.state)).and_then(|format| {
            self.run_iterations(&mut run, emitter, iterations, cancel)
                .map(|status| (status, format))
        });

        if let Err(e) = self.gpio.clear_edge_handler(self.line_in) {
            tracing::warn!("Failed to release line-in: {}", e);
        }
        if let Err(e) = emitter.close() {
            tracing::warn!(%transport, "Failed to close emitter: {}", e);
        }
        run.state.disarm();
        run.drain_events();

        let (status, format) = outcome.inspect_err(|e| {
            tracing::error!(%transport, %method, "Run failed: {}", e);
        })?;

        let report = run.into_report(transport, status, format);
        tracing::info!(
            %transport,
            %method,
            ?status,
            valid = report.valid_count(),
            of = iterations,
            max_us = ?report.stats.max_latency_us(),
            avg_us = ?report.stats.avg_latency_us(),
            "Run finished"
        );
        Ok(report)
    }

    fn run_iterations(
        &self,
        run: &mut MeasurementRun,
        emitter: &mut dyn SignalEmitter,
        iterations: usize,
        cancel: &CancelToken,
    ) -> Result<RunStatus> {
        for i in 0..iterations {
            if cancel.is_cancelled() {
                tracing::info!(completed = i, "Run cancelled");
                return Ok(RunStatus::Cancelled {
                    completed_iterations: i,
                });
            }

            run.drain_events();
            let interval = match run.method {
                MeasurementMethod::Measure => {
                    self.policy.signal_interval(i, run.stats.max_latency_us())
                }
                MeasurementMethod::Calibrate => self.policy.start_interval(),
            };

            run.state.disarm();
            emitter.emit()?;
            run.intervals.push(interval);

            tracing::debug!(
                iteration = i,
                interval_us = interval.as_micros() as u64,
                "signal sent"
            );
            std::thread::sleep(interval);
        }
        Ok(RunStatus::Completed)
    }
}
