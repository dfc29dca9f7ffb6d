// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{
    CancelToken, CsvExporter, GpioBackend, LineLevelEmitter, MeasurementMethod,
    MeasurementSequencer, PcmBackend, PcmEmitter, PcmEmitterSettings, Result, RigConfig,
    RunReport, SignalEmitter, SignalQuality, Transport, TransportKind,
};

/// A measurement rig: configuration plus the hardware it drives.
pub struct Rig {
    config: RigConfig,
    gpio: Arc<dyn GpioBackend>,
    pcm: Arc<dyn PcmBackend>,
    sequencer: MeasurementSequencer,
    exporter: CsvExporter,
}

impl Rig {
    pub fn new(
        config: RigConfig,
        gpio: Arc<dyn GpioBackend>,
        pcm: Arc<dyn PcmBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let sequencer = MeasurementSequencer::from_config(Arc::clone(&gpio), &config)?;
        let exporter = CsvExporter::new(config.output_dir.clone());

        tracing::debug!(clock = gpio.description(), "Rig ready");
        Ok(Self {
            config,
            gpio,
            pcm,
            sequencer,
            exporter,
        })
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn gpio(&self) -> &Arc<dyn GpioBackend> {
        &self.gpio
    }

    /// Build the emitter for `kind` from the configured pins and device ids.
    pub fn emitter_for(&self, kind: TransportKind) -> Result<Box<dyn SignalEmitter>> {
        let signal_length = self.config.signal_length();
        match self.config.transport(kind) {
            Transport::LineLevel { line_out } => Ok(Box::new(LineLevelEmitter::new(
                Arc::clone(&self.gpio),
                line_out,
                signal_length,
            ))),
            transport => Ok(Box::new(PcmEmitter::new(
                Arc::clone(&self.pcm),
                Arc::clone(&self.gpio),
                transport,
                PcmEmitterSettings::from_config(&self.config.pcm, signal_length),
            )?)),
        }
    }

    pub fn run(
        &self,
        kind: TransportKind,
        method: MeasurementMethod,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        let mut emitter = self.emitter_for(kind)?;
        self.sequencer.run(emitter.as_mut(), method, cancel)
    }

    /// Measure run on `kind`. The CSV path is returned for completed runs;
    /// cancelled runs are reported but not written.
    pub fn measure(
        &self,
        kind: TransportKind,
        cancel: &CancelToken,
    ) -> Result<(RunReport, Option<PathBuf>)> {
        let report = self.run(kind, MeasurementMethod::Measure, cancel)?;
        if !report.is_completed() {
            tracing::info!(transport = %kind, "Measurement cancelled, nothing written");
            return Ok((report, None));
        }
        let path = self.exporter.export(&report)?;
        Ok((report, Some(path)))
    }

    /// Calibration run on `kind`. Quality is `None` when cancelled.
    pub fn calibrate(
        &self,
        kind: TransportKind,
        cancel: &CancelToken,
    ) -> Result<(RunReport, Option<SignalQuality>)> {
        let report = self.run(kind, MeasurementMethod::Calibrate, cancel)?;
        let quality = SignalQuality::from_report(&report);
        if let Some(quality) = quality {
            tracing::info!(
                transport = %kind,
                %quality,
                valid = report.valid_count(),
                of = report.series.capacity(),
                "Calibration finished"
            );
        }
        Ok((report, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LatencyError;
    use crate::sim::{DutModel, SimulatedGpio, SimulatedPcm};
    use std::time::Duration;
    use tempfile::TempDir;

    fn rig(dir: &TempDir, latency_ms: u64) -> (Rig, Arc<SimulatedGpio>, Arc<SimulatedPcm>) {
        let mut config = RigConfig::default();
        config.counts.measurements = 3;
        config.counts.calibration_measurements = 2;
        config.timing.start_interval_s = 0.03;
        config.timing.minimum_interval_s = 0.01;
        config.output_dir = dir.path().to_path_buf();

        let gpio = Arc::new(SimulatedGpio::new());
        gpio.connect_dut(
            config.pins.line_out,
            config.pins.line_in,
            DutModel::with_latency(Duration::from_millis(latency_ms)),
        );
        let pcm = Arc::new(SimulatedPcm::new(gpio.clone()));
        let rig = Rig::new(config, gpio.clone(), pcm.clone()).unwrap();
        (rig, gpio, pcm)
    }

    #[test]
    fn test_measure_writes_csv() {
        let dir = TempDir::new().unwrap();
        let (rig, _gpio, _pcm) = rig(&dir, 5);

        let (report, path) = rig
            .measure(TransportKind::LineLevel, &CancelToken::new())
            .unwrap();
        assert!(report.is_completed());
        let path = path.unwrap();
        assert!(path.starts_with(dir.path()));
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_back_to_back_measurements_keep_both_files() {
        let dir = TempDir::new().unwrap();
        let (rig, _gpio, _pcm) = rig(&dir, 1);
        let cancel = CancelToken::new();

        let (_, first) = rig.measure(TransportKind::LineLevel, &cancel).unwrap();
        let (_, second) = rig.measure(TransportKind::LineLevel, &cancel).unwrap();

        assert_ne!(first.unwrap(), second.unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_cancelled_measure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (rig, _gpio, _pcm) = rig(&dir, 5);
        let cancel = CancelToken::new();
        cancel.cancel();

        let (report, path) = rig.measure(TransportKind::LineLevel, &cancel).unwrap();
        assert!(!report.is_completed());
        assert!(path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_calibrate_usb() {
        let dir = TempDir::new().unwrap();
        let (rig, _gpio, pcm) = rig(&dir, 5);

        let (report, quality) = rig
            .calibrate(TransportKind::UsbPcm, &CancelToken::new())
            .unwrap();
        assert_eq!(quality, Some(SignalQuality::Good));
        assert_eq!(report.stream_format.buffer_size, 64 * 2 * 2);
        assert_eq!(pcm.opened_devices(), vec!["hw:CARD=usb_audio_top".to_string()]);
        assert_eq!(pcm.drains(), 1);
        // calibration is never persisted
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unavailable_transport_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (rig, _gpio, pcm) = rig(&dir, 5);
        pcm.fail_device("hw:CARD=pcie_audio");

        let err = rig
            .measure(TransportKind::PciePcm, &CancelToken::new())
            .unwrap_err();
        assert!(err.is_transport_unavailable());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = RigConfig::default();
        config.timing.start_interval_s = -1.0;
        let gpio = Arc::new(SimulatedGpio::new());
        let pcm = Arc::new(SimulatedPcm::new(gpio.clone()));
        assert!(Rig::new(config, gpio, pcm).is_err());
    }

    #[test]
    fn test_oversized_signal_length_rejected_before_run() {
        let mut config = RigConfig::default();
        config.timing.signal_length_s = 1e20;
        let gpio = Arc::new(SimulatedGpio::new());
        let pcm = Arc::new(SimulatedPcm::new(gpio.clone()));
        let err = Rig::new(config, gpio, pcm).err().unwrap();
        assert!(matches!(err, LatencyError::Configuration(_)));
    }
}
