// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use crate::core::{
    LatencyError, PcmBackend, PcmParams, PcmStream, PcmWriteError, Result, SampleFormat,
};

fn pcm_err(device_id: &str, what: &str, e: alsa::Error) -> LatencyError {
    LatencyError::Pcm(format!("{}: {} failed: {}", device_id, what, e))
}

/// ALSA playback, one blocking interleaved stream per device.
pub struct AlsaPcm;

impl AlsaPcm {
    pub fn new() -> Self {
        Self
    }
}

impl PcmBackend for AlsaPcm {
    fn open(&self, device_id: &str) -> Result<Box<dyn PcmStream>> {
        let pcm = PCM::new(device_id, Direction::Playback, false)
            .map_err(|e| pcm_err(device_id, "open", e))?;
        Ok(Box::new(AlsaStream {
            device_id: device_id.to_string(),
            pcm,
        }))
    }
}

struct AlsaStream {
    device_id: String,
    pcm: PCM,
}

impl AlsaStream {
    /// Negotiate hardware parameters. Errors carry the failing call.
    fn apply(
        &self,
        requested: &PcmParams,
    ) -> std::result::Result<PcmParams, (&'static str, alsa::Error)> {
        let hwp = HwParams::any(&self.pcm).map_err(|e| ("hw_params_any", e))?;
        hwp.set_access(Access::RWInterleaved)
            .map_err(|e| ("set_access", e))?;
        hwp.set_format(Format::s16()).map_err(|e| ("set_format", e))?;
        hwp.set_channels(requested.channels)
            .map_err(|e| ("set_channels", e))?;
        hwp.set_rate_near(requested.sample_rate, ValueOr::Nearest)
            .map_err(|e| ("set_rate_near", e))?;

        let period = if requested.period_frames == 0 {
            hwp.get_period_size_min()
                .map_err(|e| ("get_period_size_min", e))?
        } else {
            requested.period_frames as alsa::pcm::Frames
        };
        hwp.set_period_size_near(period, ValueOr::Nearest)
            .map_err(|e| ("set_period_size_near", e))?;
        self.pcm.hw_params(&hwp).map_err(|e| ("hw_params", e))?;

        let current = self
            .pcm
            .hw_params_current()
            .map_err(|e| ("hw_params_current", e))?;
        Ok(PcmParams {
            sample_rate: current.get_rate().map_err(|e| ("get_rate", e))?,
            channels: current.get_channels().map_err(|e| ("get_channels", e))?,
            format: SampleFormat::S16Le,
            period_frames: current
                .get_period_size()
                .map_err(|e| ("get_period_size", e))? as usize,
        })
    }
}

impl PcmStream for AlsaStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn configure(&mut self, requested: &PcmParams) -> Result<PcmParams> {
        let params = self
            .apply(requested)
            .map_err(|(what, e)| pcm_err(&self.device_id, what, e))?;
        tracing::debug!(
            device = %self.device_id,
            rate = params.sample_rate,
            period_frames = params.period_frames,
            "hardware parameters applied"
        );
        Ok(params)
    }

    fn write_period(&mut self, samples: &[i16]) -> std::result::Result<usize, PcmWriteError> {
        let io = self
            .pcm
            .io_i16()
            .map_err(|e| PcmWriteError::Failed(e.to_string()))?;
        match io.writei(samples) {
            Ok(frames) => Ok(frames),
            Err(e) if e.errno() == libc::EPIPE => Err(PcmWriteError::Underrun),
            Err(e) => Err(PcmWriteError::Failed(e.to_string())),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        self.pcm
            .prepare()
            .map_err(|e| pcm_err(&self.device_id, "prepare", e))
    }

    fn drain(&mut self) -> Result<()> {
        self.pcm
            .drain()
            .map_err(|e| pcm_err(&self.device_id, "drain", e))
    }
}
