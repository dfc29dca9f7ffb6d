// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod calibrate;
pub mod measure;
pub mod panel;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use audiolag::sim::{DutModel, SimulatedGpio, SimulatedPcm};
use audiolag::{CancelToken, GpioBackend, PcmBackend, Rig, RigConfig};

use crate::RigArgs;

/// Effective configuration: file (or defaults) plus command-line overrides.
pub fn load_config(args: &RigArgs) -> Result<RigConfig> {
    let mut config = match &args.config {
        Some(path) => RigConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            RigConfig::load_or_default(&cwd)
        }
    };
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

/// Build the rig on the simulated DUT or on the board's hardware.
pub fn build_rig(args: &RigArgs, config: RigConfig) -> Result<Rig> {
    let (gpio, pcm): (Arc<dyn GpioBackend>, Arc<dyn PcmBackend>) = match args.simulate {
        Some(latency_ms) => {
            let gpio = Arc::new(SimulatedGpio::new());
            gpio.connect_dut(
                config.pins.line_out,
                config.pins.line_in,
                DutModel::with_latency(Duration::from_millis(latency_ms))
                    .bouncing(args.bounce, Duration::from_micros(50)),
            );
            tracing::info!(latency_ms, bounce = args.bounce, "Using simulated DUT");
            let pcm = Arc::new(SimulatedPcm::new(Arc::clone(&gpio)));
            (gpio as Arc<dyn GpioBackend>, pcm as Arc<dyn PcmBackend>)
        }
        None => hardware()?,
    };
    Rig::new(config, gpio, pcm).context("Failed to set up rig")
}

#[cfg(all(target_os = "linux", feature = "rpi"))]
fn hardware() -> Result<(Arc<dyn GpioBackend>, Arc<dyn PcmBackend>)> {
    use audiolag::linux::{AlsaPcm, RppalGpio};

    let gpio = RppalGpio::new().context("Failed to open GPIO")?;
    Ok((Arc::new(gpio), Arc::new(AlsaPcm::new())))
}

#[cfg(not(all(target_os = "linux", feature = "rpi")))]
fn hardware() -> Result<(Arc<dyn GpioBackend>, Arc<dyn PcmBackend>)> {
    anyhow::bail!("built without the rpi feature; pass --simulate <MS> to run without hardware")
}

/// Cancel token tripped by Ctrl+C.
pub fn cancel_on_ctrlc() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupted, stopping after the current signal");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(cancel)
}

/// `12.345 ms`, or `-` without samples.
pub fn format_micros(value: Option<u32>) -> String {
    match value {
        Some(us) => format!("{:.3} ms", f64::from(us) / 1000.0),
        None => "-".to_string(),
    }
}
