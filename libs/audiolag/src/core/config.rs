// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Rig configuration via `audiolag.yaml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::interval::seconds_setting;
use crate::core::{IntervalPolicy, LatencyError, PinNumber, Result, Transport, TransportKind};

/// BCM pin assignment of the measurement board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub line_in: PinNumber,
    pub line_out: PinNumber,

    pub start_measurement_button: PinNumber,
    pub calibration_button: PinNumber,
    pub line_mode_button: PinNumber,
    pub usb_mode_button: PinNumber,
    pub hdmi_mode_button: PinNumber,
    pub pcie_mode_button: PinNumber,
    /// Cycles average / maximum / minimum. Not fitted on every board.
    pub display_mode_button: Option<PinNumber>,

    pub start_measurement_led: PinNumber,
    pub calibration_red_led: PinNumber,
    pub calibration_yellow_led: PinNumber,
    pub calibration_green_led: PinNumber,
    pub line_mode_led: PinNumber,
    pub usb_mode_led: PinNumber,
    pub hdmi_mode_led: PinNumber,
    pub pcie_mode_led: PinNumber,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            line_in: 4,
            line_out: 5,
            start_measurement_button: 9,
            calibration_button: 10,
            line_mode_button: 15,
            usb_mode_button: 23,
            hdmi_mode_button: 25,
            pcie_mode_button: 7,
            display_mode_button: None,
            start_measurement_led: 11,
            calibration_red_led: 22,
            calibration_yellow_led: 27,
            calibration_green_led: 17,
            line_mode_led: 14,
            usb_mode_led: 18,
            hdmi_mode_led: 24,
            pcie_mode_led: 8,
        }
    }
}

/// Signal length and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub signal_length_s: f64,
    pub start_interval_s: f64,
    /// Floor for the adaptive interval; some amplifiers need this much
    /// off-time between pulses.
    pub minimum_interval_s: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            signal_length_s: 0.001,
            start_interval_s: IntervalPolicy::DEFAULT_START_INTERVAL_S,
            minimum_interval_s: IntervalPolicy::DEFAULT_MINIMUM_INTERVAL_S,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountConfig {
    pub measurements: usize,
    pub calibration_measurements: usize,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            measurements: 100,
            calibration_measurements: 10,
        }
    }
}

/// Playback parameters for the PCM transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmConfig {
    pub sample_rate: u32,
    pub channels: u32,
    /// Lower bound on periods written per signal, whatever the period time.
    pub min_periods_per_signal: usize,
    /// Constant sample written to every slot of the signal buffer.
    pub sample_value: i16,
}

impl Default for PcmConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            min_periods_per_signal: 25,
            sample_value: 0x7F7F,
        }
    }
}

/// ALSA device ids per transport, in fallback order (at most two).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub usb: Vec<String>,
    pub hdmi: Vec<String>,
    pub pcie: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            usb: vec![
                "hw:CARD=usb_audio_top".to_string(),
                "hw:CARD=usb_audio_bot".to_string(),
            ],
            hdmi: vec![
                "hw:CARD=hdmi_audio_0".to_string(),
                "hw:CARD=hdmi_audio_1".to_string(),
            ],
            pcie: vec!["hw:CARD=pcie_audio".to_string()],
        }
    }
}

/// Configuration from `audiolag.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub pins: PinConfig,
    pub timing: TimingConfig,
    pub counts: CountConfig,
    pub pcm: PcmConfig,
    pub devices: DeviceConfig,
    /// Directory CSV results are written to.
    pub output_dir: PathBuf,
    /// Button polling period of the control panel, in milliseconds.
    pub panel_poll_ms: u64,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            pins: PinConfig::default(),
            timing: TimingConfig::default(),
            counts: CountConfig::default(),
            pcm: PcmConfig::default(),
            devices: DeviceConfig::default(),
            output_dir: PathBuf::from("measurements"),
            panel_poll_ms: 10,
        }
    }
}

impl RigConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "audiolag.yaml";

    /// Longest accepted `timing.signal_length_s`.
    pub const MAX_SIGNAL_LENGTH_S: f64 = 1.0;

    /// Load from a YAML file. Errors if missing, unparseable or invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LatencyError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            LatencyError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        tracing::info!("Loaded rig config from {}", path.display());
        Ok(config)
    }

    /// Load `audiolag.yaml` from a directory.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::from_file(&dir.join(Self::FILE_NAME))
    }

    /// Load `audiolag.yaml` from a directory, falling back to defaults if the
    /// file is missing, unparseable or invalid.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        IntervalPolicy::new(self.timing.start_interval_s, self.timing.minimum_interval_s)?;

        seconds_setting("signal length", self.timing.signal_length_s, Self::MAX_SIGNAL_LENGTH_S)?;
        if self.counts.measurements == 0 || self.counts.calibration_measurements == 0 {
            return Err(LatencyError::Configuration(
                "measurement counts must be at least 1".to_string(),
            ));
        }
        if self.pcm.sample_rate == 0 || self.pcm.channels == 0 {
            return Err(LatencyError::Configuration(
                "PCM sample rate and channel count must be non-zero".to_string(),
            ));
        }
        for (kind, devices) in [
            (TransportKind::UsbPcm, &self.devices.usb),
            (TransportKind::HdmiPcm, &self.devices.hdmi),
            (TransportKind::PciePcm, &self.devices.pcie),
        ] {
            if devices.is_empty() || devices.len() > 2 {
                return Err(LatencyError::Configuration(format!(
                    "{} transport needs one device id and at most one fallback, got {}",
                    kind,
                    devices.len()
                )));
            }
        }
        Ok(())
    }

    pub fn interval_policy(&self) -> Result<IntervalPolicy> {
        IntervalPolicy::new(self.timing.start_interval_s, self.timing.minimum_interval_s)
    }

    pub fn signal_length(&self) -> Duration {
        Duration::from_secs_f64(self.timing.signal_length_s)
    }

    pub fn panel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.panel_poll_ms)
    }

    pub fn transport(&self, kind: TransportKind) -> Transport {
        match kind {
            TransportKind::LineLevel => Transport::LineLevel {
                line_out: self.pins.line_out,
            },
            TransportKind::UsbPcm => Transport::UsbPcm {
                devices: self.devices.usb.clone(),
            },
            TransportKind::HdmiPcm => Transport::HdmiPcm {
                devices: self.devices.hdmi.clone(),
            },
            TransportKind::PciePcm => Transport::PciePcm {
                devices: self.devices.pcie.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = RigConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pins.line_in, 4);
        assert_eq!(config.pins.line_out, 5);
        assert_eq!(config.counts.measurements, 100);
        assert_eq!(config.counts.calibration_measurements, 10);
        assert_eq!(config.signal_length(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(RigConfig::FILE_NAME),
            "counts:\n  measurements: 5\ntiming:\n  start_interval_s: 0.5\noutput_dir: /tmp/results\n",
        )
        .unwrap();

        let config = RigConfig::load(dir.path()).unwrap();
        assert_eq!(config.counts.measurements, 5);
        assert_eq!(config.counts.calibration_measurements, 10);
        assert_eq!(config.timing.start_interval_s, 0.5);
        assert_eq!(config.timing.minimum_interval_s, 0.02);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/results"));
        assert_eq!(config.devices, DeviceConfig::default());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = RigConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, LatencyError::Configuration(_)));
    }

    #[test]
    fn test_load_or_default_missing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(RigConfig::load_or_default(dir.path()), RigConfig::default());
    }

    #[test]
    fn test_load_or_default_invalid() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(RigConfig::FILE_NAME),
            "timing:\n  minimum_interval_s: 0.0\n",
        )
        .unwrap();
        assert!(RigConfig::load(dir.path()).is_err());
        assert_eq!(RigConfig::load_or_default(dir.path()), RigConfig::default());
    }

    #[test]
    fn test_validate_rejects_three_devices() {
        let mut config = RigConfig::default();
        config.devices.usb.push("hw:CARD=third".to_string());
        assert!(config.validate().is_err());

        config.devices.usb.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        let mut config = RigConfig::default();
        config.counts.calibration_measurements = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_durations() {
        let mut config = RigConfig::default();
        config.timing.signal_length_s = 1e20;
        assert!(matches!(config.validate(), Err(LatencyError::Configuration(_))));

        let mut config = RigConfig::default();
        config.timing.start_interval_s = 1e20;
        assert!(config.validate().is_err());

        let mut config = RigConfig::default();
        config.timing.minimum_interval_s = f64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_signal_length() {
        let mut config = RigConfig::default();
        config.timing.signal_length_s = RigConfig::MAX_SIGNAL_LENGTH_S;
        assert!(config.validate().is_ok());
        assert_eq!(config.signal_length(), Duration::from_secs(1));

        config.timing.signal_length_s = RigConfig::MAX_SIGNAL_LENGTH_S * 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_transport_from_config() {
        let config = RigConfig::default();
        assert_eq!(
            config.transport(TransportKind::LineLevel),
            Transport::LineLevel { line_out: 5 }
        );
        assert_eq!(
            config.transport(TransportKind::PciePcm).device_ids(),
            ["hw:CARD=pcie_audio".to_string()]
        );
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = serde_yaml::to_string(&RigConfig::default()).unwrap();
        let parsed: RigConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, RigConfig::default());
    }
}
