// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

use crate::core::TransportKind;

#[derive(Error, Debug)]
pub enum LatencyError {
    /// Every device id configured for the transport failed to open or configure.
    #[error("{transport} transport unavailable (tried: {})", tried.join(", "))]
    TransportUnavailable {
        transport: TransportKind,
        tried: Vec<String>,
    },

    #[error("GPIO operation failed: {0}")]
    Gpio(String),

    #[error("PCM operation failed: {0}")]
    Pcm(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LatencyError {
    /// True for failures that abort a whole run rather than a single sample.
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, LatencyError::TransportUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, LatencyError>;

/// Outcome of a single period write. Underruns are recoverable in place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PcmWriteError {
    #[error("buffer underrun")]
    Underrun,

    #[error("write failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_unavailable_message_lists_devices() {
        let err = LatencyError::TransportUnavailable {
            transport: TransportKind::UsbPcm,
            tried: vec![
                "hw:CARD=usb_audio_top".to_string(),
                "hw:CARD=usb_audio_bot".to_string(),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("USB"));
        assert!(message.contains("hw:CARD=usb_audio_top, hw:CARD=usb_audio_bot"));
        assert!(err.is_transport_unavailable());
        assert!(!LatencyError::Gpio("x".into()).is_transport_unavailable());
    }
}
