// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{LatencyError, PinNumber, Result};

/// Output path the timing signal takes into the device under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    LineLevel,
    UsbPcm,
    HdmiPcm,
    PciePcm,
}

impl TransportKind {
    pub const ALL: [TransportKind; 4] = [
        TransportKind::LineLevel,
        TransportKind::UsbPcm,
        TransportKind::HdmiPcm,
        TransportKind::PciePcm,
    ];

    pub fn is_pcm(self) -> bool {
        !matches!(self, TransportKind::LineLevel)
    }

    /// `DUT_INPUT` column value.
    pub fn dut_input_label(self) -> &'static str {
        match self {
            TransportKind::LineLevel => "LINE IN",
            TransportKind::UsbPcm => "USB IN",
            TransportKind::HdmiPcm => "HDMI IN",
            TransportKind::PciePcm => "PCIE IN",
        }
    }

    /// `DUT_OUTPUT` column value. The signal always returns on line level.
    pub fn dut_output_label(self) -> &'static str {
        "LINE OUT"
    }

    pub fn file_name_prefix(self) -> &'static str {
        match self {
            TransportKind::LineLevel => "line-to-line_",
            TransportKind::UsbPcm => "usb-to-line_",
            TransportKind::HdmiPcm => "hdmi-to-line_",
            TransportKind::PciePcm => "pcie-to-line_",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::LineLevel => "line-level",
            TransportKind::UsbPcm => "USB",
            TransportKind::HdmiPcm => "HDMI",
            TransportKind::PciePcm => "PCIe",
        };
        f.write_str(name)
    }
}

impl FromStr for TransportKind {
    type Err = LatencyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "line" | "line-level" | "line_level" => Ok(TransportKind::LineLevel),
            "usb" | "usb-pcm" | "usb_pcm" => Ok(TransportKind::UsbPcm),
            "hdmi" | "hdmi-pcm" | "hdmi_pcm" => Ok(TransportKind::HdmiPcm),
            "pcie" | "pcie-pcm" | "pcie_pcm" => Ok(TransportKind::PciePcm),
            other => Err(LatencyError::Configuration(format!(
                "Unknown transport '{}' (expected line, usb, hdmi or pcie)",
                other
            ))),
        }
    }
}

/// A transport together with what it needs to reach the hardware.
///
/// PCM variants carry their device ids in fallback order: the first entry is
/// tried first, the second (if any) is the single fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    LineLevel { line_out: PinNumber },
    UsbPcm { devices: Vec<String> },
    HdmiPcm { devices: Vec<String> },
    PciePcm { devices: Vec<String> },
}

impl Transport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::LineLevel { .. } => TransportKind::LineLevel,
            Transport::UsbPcm { .. } => TransportKind::UsbPcm,
            Transport::HdmiPcm { .. } => TransportKind::HdmiPcm,
            Transport::PciePcm { .. } => TransportKind::PciePcm,
        }
    }

    /// PCM device ids in the order they are tried. Empty for line level.
    pub fn device_ids(&self) -> &[String] {
        match self {
            Transport::LineLevel { .. } => &[],
            Transport::UsbPcm { devices }
            | Transport::HdmiPcm { devices }
            | Transport::PciePcm { devices } => devices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport_kind() {
        assert_eq!("line".parse::<TransportKind>().unwrap(), TransportKind::LineLevel);
        assert_eq!("USB".parse::<TransportKind>().unwrap(), TransportKind::UsbPcm);
        assert_eq!("hdmi".parse::<TransportKind>().unwrap(), TransportKind::HdmiPcm);
        assert_eq!("pcie_pcm".parse::<TransportKind>().unwrap(), TransportKind::PciePcm);
        assert!("spdif".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_csv_labels() {
        assert_eq!(TransportKind::LineLevel.dut_input_label(), "LINE IN");
        assert_eq!(TransportKind::PciePcm.dut_input_label(), "PCIE IN");
        assert_eq!(TransportKind::HdmiPcm.dut_output_label(), "LINE OUT");
        assert_eq!(TransportKind::UsbPcm.file_name_prefix(), "usb-to-line_");
    }

    #[test]
    fn test_device_ids() {
        let usb = Transport::UsbPcm {
            devices: vec!["a".into(), "b".into()],
        };
        assert_eq!(usb.kind(), TransportKind::UsbPcm);
        assert_eq!(usb.device_ids(), ["a".to_string(), "b".to_string()]);

        let line = Transport::LineLevel { line_out: 5 };
        assert!(line.device_ids().is_empty());
        assert!(!line.kind().is_pcm());
    }
}
