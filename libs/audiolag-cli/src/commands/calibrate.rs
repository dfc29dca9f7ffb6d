// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use anyhow::{Context, Result};
use audiolag::TransportKind;

use super::{build_rig, cancel_on_ctrlc, format_micros, load_config};
use crate::RigArgs;

pub fn run(
    args: &RigArgs,
    transport: TransportKind,
    count: Option<usize>,
    continuous: bool,
) -> Result<()> {
    let mut config = load_config(args)?;
    if let Some(count) = count {
        config.counts.calibration_measurements = count;
    }
    let rig = build_rig(args, config)?;
    let cancel = cancel_on_ctrlc()?;

    loop {
        let (report, quality) = rig
            .calibrate(transport, &cancel)
            .with_context(|| format!("{} calibration failed", transport))?;

        let Some(quality) = quality else {
            println!("Calibration cancelled");
            break;
        };
        println!(
            "{}: signal {} ({}/{} returned, max {})",
            transport,
            quality,
            report.valid_count(),
            report.series.capacity(),
            format_micros(report.stats.max_latency_us())
        );

        if !continuous || cancel.is_cancelled() {
            break;
        }
    }
    Ok(())
}
