// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

use crate::core::{MeasurementMethod, RunReport};

/// How reliably the signal makes the round trip, judged from a calibration
/// run's valid count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalQuality {
    /// Every signal came back.
    Good,
    /// More than half came back.
    Medium,
    Bad,
}

impl SignalQuality {
    pub fn assess(valid: usize, total: usize) -> Self {
        if total > 0 && valid >= total {
            SignalQuality::Good
        } else if valid > total / 2 {
            SignalQuality::Medium
        } else {
            SignalQuality::Bad
        }
    }

    /// Quality of a completed calibration run; `None` for anything else.
    pub fn from_report(report: &RunReport) -> Option<Self> {
        if report.method != MeasurementMethod::Calibrate || !report.is_completed() {
            return None;
        }
        Some(Self::assess(report.valid_count(), report.series.capacity()))
    }

    /// Calibration LEDs lit for this quality, as (green, yellow, red).
    pub fn leds(self) -> (bool, bool, bool) {
        match self {
            SignalQuality::Good => (true, true, true),
            SignalQuality::Medium => (false, true, true),
            SignalQuality::Bad => (false, false, true),
        }
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalQuality::Good => write!(f, "good"),
            SignalQuality::Medium => write!(f, "medium"),
            SignalQuality::Bad => write!(f, "bad"),
        }
    }
}
