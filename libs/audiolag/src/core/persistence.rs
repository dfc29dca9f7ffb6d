// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! CSV export of completed measurement runs.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::core::{LatencyError, Result, RunReport, TransportKind};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Runs finishing within the same second get `_1`, `_2`, ... suffixes.
const MAX_FILES_PER_SECOND: usize = 100;

/// One CSV row. Field order is the column order.
#[derive(Debug, Serialize)]
struct LatencyRow<'a> {
    #[serde(rename = "LATENCY_IN_MICROS")]
    latency_in_micros: i64,
    #[serde(rename = "DUT_INPUT")]
    dut_input: &'a str,
    #[serde(rename = "DUT_OUTPUT")]
    dut_output: &'a str,
    #[serde(rename = "BUFFER_SIZE")]
    buffer_size: usize,
    #[serde(rename = "SAMPLE_RATE")]
    sample_rate: u32,
    #[serde(rename = "CHANNELS")]
    channels: u32,
}

/// Writes one CSV file per completed run into `output_dir`.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// `<prefix><local timestamp>.csv`, e.g. `usb-to-line_2025-03-01_14-02-59.csv`.
    ///
    /// `sequence` > 0 appends `_<sequence>` before the extension.
    pub fn file_name(
        transport: TransportKind,
        timestamp: &DateTime<Local>,
        sequence: usize,
    ) -> String {
        let stem = format!(
            "{}{}",
            transport.file_name_prefix(),
            timestamp.format(TIMESTAMP_FORMAT)
        );
        if sequence == 0 {
            format!("{}.csv", stem)
        } else {
            format!("{}_{}.csv", stem, sequence)
        }
    }

    /// Create a file that did not exist before. Earlier results are never
    /// truncated.
    fn create_new_file(
        &self,
        transport: TransportKind,
        timestamp: &DateTime<Local>,
    ) -> Result<(PathBuf, File)> {
        for sequence in 0..MAX_FILES_PER_SECOND {
            let path = self.output_dir.join(Self::file_name(transport, timestamp, sequence));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(LatencyError::Persistence(format!(
                        "Failed to create {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
        Err(LatencyError::Persistence(format!(
            "{} result files for {} already exist in {}",
            MAX_FILES_PER_SECOND,
            timestamp.format(TIMESTAMP_FORMAT),
            self.output_dir.display()
        )))
    }

    pub fn export(&self, report: &RunReport) -> Result<PathBuf> {
        self.export_at(report, &Local::now())
    }

    /// Write every slot of the series, sentinel rows included.
    ///
    /// Cancelled runs are refused; a partial series is never persisted.
    pub fn export_at(&self, report: &RunReport, timestamp: &DateTime<Local>) -> Result<PathBuf> {
        if !report.is_completed() {
            return Err(LatencyError::Persistence(format!(
                "refusing to persist an incomplete {} run ({:?})",
                report.transport, report.status
            )));
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            LatencyError::Persistence(format!(
                "Failed to create {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let (path, file) = self.create_new_file(report.transport, timestamp)?;
        let mut writer = csv::Writer::from_writer(file);

        let format = report.stream_format;
        for &latency in report.series.slots() {
            writer.serialize(LatencyRow {
                latency_in_micros: latency,
                dut_input: report.transport.dut_input_label(),
                dut_output: report.transport.dut_output_label(),
                buffer_size: format.buffer_size,
                sample_rate: format.sample_rate,
                channels: format.channels,
            })?;
        }
        writer.flush()?;

        tracing::info!(
            path = %path.display(),
            rows = report.series.capacity(),
            "Measurements written"
        );
        Ok(path)
    }
}
