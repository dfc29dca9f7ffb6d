// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use anyhow::{Context, Result};
use audiolag::{RunStatus, TransportKind};

use super::{build_rig, cancel_on_ctrlc, format_micros, load_config};
use crate::RigArgs;

pub fn run(args: &RigArgs, transport: TransportKind, count: Option<usize>) -> Result<()> {
    let mut config = load_config(args)?;
    if let Some(count) = count {
        config.counts.measurements = count;
    }
    let rig = build_rig(args, config)?;
    let cancel = cancel_on_ctrlc()?;

    println!(
        "Measuring {} -> line ({} signals)",
        transport,
        rig.config().counts.measurements
    );
    let (report, path) = rig
        .measure(transport, &cancel)
        .with_context(|| format!("{} measurement failed", transport))?;

    if let RunStatus::Cancelled {
        completed_iterations,
    } = report.status
    {
        println!(
            "Cancelled after {} signals, nothing written",
            completed_iterations
        );
        return Ok(());
    }

    let stats = report.stats;
    println!();
    println!(
        "  valid:   {}/{}",
        report.valid_count(),
        report.series.capacity()
    );
    println!("  min:     {}", format_micros(stats.min_latency_us()));
    println!("  average: {}", format_micros(stats.avg_latency_us()));
    println!("  max:     {}", format_micros(stats.max_latency_us()));
    if report.rejected_samples > 0 {
        println!("  dropped: {} (tick wraparound)", report.rejected_samples);
    }
    if let Some(path) = path {
        println!();
        println!("Results written to {}", path.display());
    }
    Ok(())
}
