// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Audio output capability consumed by the PCM emitter.

use std::time::Duration;

use crate::core::{PcmWriteError, Result};

/// Sample format written to the device. Only signed 16-bit little endian is
/// used; the variant exists so backends can report what they negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16Le,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
        }
    }
}

/// Stream parameters, both requested and negotiated.
///
/// A requested `period_frames` of 0 asks the backend for the smallest period
/// the hardware supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmParams {
    pub sample_rate: u32,
    pub channels: u32,
    pub format: SampleFormat,
    pub period_frames: usize,
}

impl PcmParams {
    /// Duration of one period at the negotiated rate.
    pub fn period_time(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.period_frames as u64 * 1_000_000 / u64::from(self.sample_rate))
    }

    /// Size in bytes of one interleaved period.
    pub fn period_bytes(&self) -> usize {
        self.period_frames * self.channels as usize * self.format.bytes_per_sample()
    }

    /// Number of interleaved samples in one period.
    pub fn period_samples(&self) -> usize {
        self.period_frames * self.channels as usize
    }
}

/// Opens playback devices by id (e.g. `hw:CARD=usb_audio_top`).
pub trait PcmBackend: Send + Sync {
    fn open(&self, device_id: &str) -> Result<Box<dyn PcmStream>>;
}

/// An open playback stream. Closed on drop.
pub trait PcmStream: Send {
    fn device_id(&self) -> &str;

    /// Apply `requested` (nearest supported values) and return what the
    /// device actually accepted.
    fn configure(&mut self, requested: &PcmParams) -> Result<PcmParams>;

    /// Write one interleaved period, returning the frames written.
    fn write_period(&mut self, samples: &[i16]) -> std::result::Result<usize, PcmWriteError>;

    /// Re-prepare after an underrun.
    fn prepare(&mut self) -> Result<()>;

    /// Block until queued audio has played.
    fn drain(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_sizes() {
        let params = PcmParams {
            sample_rate: 44_100,
            channels: 2,
            format: SampleFormat::S16Le,
            period_frames: 441,
        };
        assert_eq!(params.period_time(), Duration::from_millis(10));
        assert_eq!(params.period_bytes(), 441 * 2 * 2);
        assert_eq!(params.period_samples(), 882);
    }

    #[test]
    fn test_period_time_zero_rate() {
        let params = PcmParams {
            sample_rate: 0,
            channels: 2,
            format: SampleFormat::S16Le,
            period_frames: 64,
        };
        assert_eq!(params.period_time(), Duration::ZERO);
    }
}
