// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use anyhow::{Context, Result};
use audiolag::ControlPanel;

use super::{build_rig, cancel_on_ctrlc, load_config};
use crate::RigArgs;

pub fn run(args: &RigArgs) -> Result<()> {
    let config = load_config(args)?;
    let rig = build_rig(args, config)?;
    let cancel = cancel_on_ctrlc()?;

    println!("Front panel active, press Ctrl+C to exit");
    let mut panel = ControlPanel::for_rig(&rig);
    panel
        .run_loop(&rig, &cancel)
        .context("Front panel stopped")?;
    Ok(())
}
