// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::{
    LatencyError, PcmBackend, PcmParams, PcmStream, PcmWriteError, Result, SampleFormat,
};
use crate::sim::SimulatedGpio;

/// Writes further apart than this start a new burst.
const BURST_GAP: Duration = Duration::from_millis(5);

#[derive(Default)]
struct PcmSimState {
    failing: HashSet<String>,
    underruns: HashSet<usize>,
    opened: Vec<String>,
    writes: usize,
    periods_written: usize,
    prepares: usize,
    drains: usize,
    last_samples: Vec<i16>,
    last_write: Option<Instant>,
}

/// In-memory playback backend.
///
/// The first completed period of every burst is fed into the DUT model of
/// the attached [`SimulatedGpio`], so the signal comes back on line-in like
/// it would through a real audio interface.
pub struct SimulatedPcm {
    gpio: Arc<SimulatedGpio>,
    period_frames: usize,
    state: Arc<Mutex<PcmSimState>>,
}

impl SimulatedPcm {
    pub const DEFAULT_PERIOD_FRAMES: usize = 64;

    pub fn new(gpio: Arc<SimulatedGpio>) -> Self {
        Self::with_period_frames(gpio, Self::DEFAULT_PERIOD_FRAMES)
    }

    /// `period_frames` is what the device reports as its minimum period.
    pub fn with_period_frames(gpio: Arc<SimulatedGpio>, period_frames: usize) -> Self {
        Self {
            gpio,
            period_frames,
            state: Arc::new(Mutex::new(PcmSimState::default())),
        }
    }

    /// Opening `device_id` fails from now on.
    pub fn fail_device(&self, device_id: &str) {
        self.state.lock().failing.insert(device_id.to_string());
    }

    /// The `write_index`-th write (0-based, counted across all streams)
    /// reports an underrun.
    pub fn underrun_on_write(&self, write_index: usize) {
        self.state.lock().underruns.insert(write_index);
    }

    /// Devices opened successfully, in order.
    pub fn opened_devices(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    pub fn periods_written(&self) -> usize {
        self.state.lock().periods_written
    }

    pub fn prepares(&self) -> usize {
        self.state.lock().prepares
    }

    pub fn drains(&self) -> usize {
        self.state.lock().drains
    }

    pub fn last_samples(&self) -> Vec<i16> {
        self.state.lock().last_samples.clone()
    }
}

impl PcmBackend for SimulatedPcm {
    fn open(&self, device_id: &str) -> Result<Box<dyn PcmStream>> {
        let mut state = self.state.lock();
        if state.failing.contains(device_id) {
            return Err(LatencyError::Pcm(format!(
                "cannot open {}: no such device",
                device_id
            )));
        }
        state.opened.push(device_id.to_string());

        Ok(Box::new(SimulatedStream {
            device_id: device_id.to_string(),
            gpio: Arc::clone(&self.gpio),
            min_period_frames: self.period_frames,
            params: None,
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimulatedStream {
    device_id: String,
    gpio: Arc<SimulatedGpio>,
    min_period_frames: usize,
    params: Option<PcmParams>,
    state: Arc<Mutex<PcmSimState>>,
}

impl PcmStream for SimulatedStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn configure(&mut self, requested: &PcmParams) -> Result<PcmParams> {
        let period_frames = requested.period_frames.max(self.min_period_frames);
        let params = PcmParams {
            sample_rate: requested.sample_rate,
            channels: requested.channels,
            format: SampleFormat::S16Le,
            period_frames,
        };
        self.params = Some(params);
        Ok(params)
    }

    fn write_period(&mut self, samples: &[i16]) -> std::result::Result<usize, PcmWriteError> {
        let Some(params) = self.params else {
            return Err(PcmWriteError::Failed("stream not configured".into()));
        };

        let starts_burst = {
            let mut state = self.state.lock();
            let index = state.writes;
            state.writes += 1;
            if state.underruns.contains(&index) {
                return Err(PcmWriteError::Underrun);
            }

            let now = Instant::now();
            let starts_burst = state
                .last_write
                .is_none_or(|last| now.duration_since(last) > BURST_GAP);
            state.last_write = Some(now);
            state.periods_written += 1;
            state.last_samples = samples.to_vec();
            starts_burst
        };

        if starts_burst {
            self.gpio.signal_dut();
        }
        Ok(samples.len() / params.channels.max(1) as usize)
    }

    fn prepare(&mut self) -> Result<()> {
        self.state.lock().prepares += 1;
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        self.state.lock().drains += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested() -> PcmParams {
        PcmParams {
            sample_rate: 44_100,
            channels: 2,
            format: SampleFormat::S16Le,
            period_frames: 0,
        }
    }

    #[test]
    fn test_configure_uses_device_minimum_period() {
        let pcm = SimulatedPcm::with_period_frames(Arc::new(SimulatedGpio::new()), 32);
        let mut stream = pcm.open("hw:CARD=test").unwrap();
        let params = stream.configure(&requested()).unwrap();
        assert_eq!(params.period_frames, 32);
        assert_eq!(params.sample_rate, 44_100);
    }

    #[test]
    fn test_write_returns_frames() {
        let pcm = SimulatedPcm::new(Arc::new(SimulatedGpio::new()));
        let mut stream = pcm.open("hw:CARD=test").unwrap();
        stream.configure(&requested()).unwrap();

        let buffer = vec![1i16; SimulatedPcm::DEFAULT_PERIOD_FRAMES * 2];
        assert_eq!(
            stream.write_period(&buffer).unwrap(),
            SimulatedPcm::DEFAULT_PERIOD_FRAMES
        );
        assert_eq!(pcm.periods_written(), 1);
    }

    #[test]
    fn test_write_before_configure_fails() {
        let pcm = SimulatedPcm::new(Arc::new(SimulatedGpio::new()));
        let mut stream = pcm.open("hw:CARD=test").unwrap();
        assert!(matches!(
            stream.write_period(&[0; 4]),
            Err(PcmWriteError::Failed(_))
        ));
    }

    #[test]
    fn test_failing_device() {
        let pcm = SimulatedPcm::new(Arc::new(SimulatedGpio::new()));
        pcm.fail_device("hw:CARD=gone");
        assert!(pcm.open("hw:CARD=gone").is_err());
        assert!(pcm.opened_devices().is_empty());
    }
}
