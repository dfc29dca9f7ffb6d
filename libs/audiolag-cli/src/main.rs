// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! audiolag CLI
//!
//! Runs measurements and calibrations from the shell, or hands the rig over
//! to the button/LED front panel.

use std::path::PathBuf;

use anyhow::Result;
use audiolag::TransportKind;
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "audiolag")]
#[command(author, version, about = "Round-trip audio latency rig", long_about = None)]
struct Cli {
    #[command(flatten)]
    rig: RigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RigArgs {
    /// Rig configuration file (default: ./audiolag.yaml if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory CSV results are written to (overrides the config)
    #[arg(short, long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Run without hardware against a simulated DUT with this latency
    #[arg(long, global = true, value_name = "MS")]
    simulate: Option<u64>,

    /// Extra bounce edges per signal of the simulated DUT
    #[arg(long, global = true, default_value = "0", requires = "simulate")]
    bounce: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one measurement and write the CSV
    Measure {
        /// Output transport: line, usb, hdmi or pcie
        #[arg(short, long, default_value = "line")]
        transport: TransportKind,

        /// Number of signals (overrides the config)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Check the signal path without writing results
    Calibrate {
        /// Output transport: line, usb, hdmi or pcie
        #[arg(short, long, default_value = "line")]
        transport: TransportKind,

        /// Number of signals (overrides the config)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Repeat until Ctrl+C
        #[arg(long)]
        continuous: bool,
    },

    /// Hand control to the front-panel buttons until Ctrl+C
    Panel,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Some(Commands::Measure { transport, count }) => {
            commands::measure::run(&cli.rig, transport, count)?;
        }
        Some(Commands::Calibrate {
            transport,
            count,
            continuous,
        }) => {
            commands::calibrate::run(&cli.rig, transport, count, continuous)?;
        }
        Some(Commands::Panel) => {
            commands::panel::run(&cli.rig)?;
        }
        None => {
            // No subcommand: show help
            Cli::parse_from(["audiolag", "--help"]);
        }
    }

    Ok(())
}
