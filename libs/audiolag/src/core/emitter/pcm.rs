// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::PcmConfig;
use crate::core::{
    GpioBackend, LatencyError, PcmBackend, PcmParams, PcmStream, PcmWriteError, Result,
    SampleFormat, SignalEmitter, SignalState, StreamFormat, Transport, TransportKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmEmitterSettings {
    pub signal_length: Duration,
    pub sample_rate: u32,
    pub channels: u32,
    pub min_periods_per_signal: usize,
    pub sample_value: i16,
}

impl PcmEmitterSettings {
    pub fn from_config(config: &PcmConfig, signal_length: Duration) -> Self {
        Self {
            signal_length,
            sample_rate: config.sample_rate,
            channels: config.channels,
            min_periods_per_signal: config.min_periods_per_signal,
            sample_value: config.sample_value,
        }
    }

    /// Periods written per signal: enough to cover the signal length, never
    /// fewer than the configured minimum.
    pub fn periods_per_signal(&self, period_time: Duration) -> usize {
        let covering = if period_time.is_zero() {
            0
        } else {
            (self.signal_length.as_micros() / period_time.as_micros().max(1)) as usize
        };
        covering.max(self.min_periods_per_signal).max(1)
    }
}

struct OpenStream {
    stream: Box<dyn PcmStream>,
    params: PcmParams,
    buffer: Vec<i16>,
    periods_per_signal: usize,
    state: Arc<SignalState>,
}

/// Constant-amplitude burst written through an ALSA playback device.
///
/// ALSA has no edge callback, so the start tick is read right after the first
/// period write completes. That tick precedes the moment the audio actually
/// leaves the DAC by the device's queueing delay; PCM samples are biased low
/// relative to line-level samples by that amount.
pub struct PcmEmitter {
    backend: Arc<dyn PcmBackend>,
    gpio: Arc<dyn GpioBackend>,
    transport: Transport,
    settings: PcmEmitterSettings,
    open: Option<OpenStream>,
}

impl PcmEmitter {
    /// `gpio` supplies the tick counter, so start and end ticks share an epoch.
    pub fn new(
        backend: Arc<dyn PcmBackend>,
        gpio: Arc<dyn GpioBackend>,
        transport: Transport,
        settings: PcmEmitterSettings,
    ) -> Result<Self> {
        if !transport.kind().is_pcm() {
            return Err(LatencyError::Configuration(format!(
                "{} is not a PCM transport",
                transport.kind()
            )));
        }
        Ok(Self {
            backend,
            gpio,
            transport,
            settings,
            open: None,
        })
    }

    fn requested_params(&self) -> PcmParams {
        PcmParams {
            sample_rate: self.settings.sample_rate,
            channels: self.settings.channels,
            format: SampleFormat::S16Le,
            period_frames: 0,
        }
    }

    fn open_device(&self, device_id: &str) -> Result<(Box<dyn PcmStream>, PcmParams)> {
        let requested = self.requested_params();
        let mut stream = self.backend.open(device_id)?;
        let params = stream.configure(&requested)?;

        if params.period_frames == 0 || params.channels == 0 {
            return Err(LatencyError::Pcm(format!(
                "{} negotiated an empty period",
                device_id
            )));
        }
        if params.sample_rate != requested.sample_rate {
            tracing::warn!(
                device = device_id,
                "Sample rate {} Hz not supported, using {} Hz",
                requested.sample_rate,
                params.sample_rate
            );
        }
        Ok((stream, params))
    }
}

impl SignalEmitter for PcmEmitter {
    fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    fn open(&mut self, state: Arc<SignalState>) -> Result<StreamFormat> {
        let mut tried = Vec::new();

        for device_id in self.transport.device_ids() {
            tried.push(device_id.clone());
            match self.open_device(device_id) {
                Ok((stream, params)) => {
                    let period_time = params.period_time();
                    let periods_per_signal = self.settings.periods_per_signal(period_time);
                    let buffer = vec![self.settings.sample_value; params.period_samples()];

                    tracing::info!(
                        device = %device_id,
                        rate = params.sample_rate,
                        channels = params.channels,
                        period_frames = params.period_frames,
                        period_us = period_time.as_micros() as u64,
                        periods_per_signal,
                        "PCM device open"
                    );

                    let format = StreamFormat {
                        buffer_size: params.period_bytes(),
                        sample_rate: params.sample_rate,
                        channels: params.channels,
                    };
                    self.open = Some(OpenStream {
                        stream,
                        params,
                        buffer,
                        periods_per_signal,
                        state,
                    });
                    return Ok(format);
                }
                Err(e) => {
                    tracing::warn!(device = %device_id, "Unable to open PCM device: {}", e);
                }
            }
        }

        Err(LatencyError::TransportUnavailable {
            transport: self.transport.kind(),
            tried,
        })
    }

    fn emit(&mut self) -> Result<()> {
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| LatencyError::Pcm("PCM emitter is not open".into()))?;

        let frames = open.params.period_frames;
        let mut armed = false;

        for period in 0..open.periods_per_signal {
            match open.stream.write_period(&open.buffer) {
                Ok(written) if written == frames => {
                    if !armed {
                        open.state.arm(self.gpio.current_tick());
                        armed = true;
                    }
                }
                Ok(written) => {
                    tracing::debug!(period, written, frames, "short PCM write");
                }
                Err(PcmWriteError::Underrun) => {
                    tracing::warn!(period, "PCM underrun, re-preparing device");
                    open.stream.prepare()?;
                }
                Err(PcmWriteError::Failed(e)) => {
                    tracing::warn!(period, "PCM write failed: {}", e);
                }
            }
        }

        if !armed {
            tracing::warn!(
                device = open.stream.device_id(),
                "no complete period written, signal not armed"
            );
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut open) = self.open.take() else {
            return Ok(());
        };
        open.stream.drain()?;
        tracing::debug!(device = open.stream.device_id(), "PCM device closed");
        Ok(())
    }
}
