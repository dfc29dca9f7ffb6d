// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod calibration;
pub mod clocks;
pub mod config;
pub mod detector;
pub mod emitter;
pub mod error;
pub mod gpio;
pub mod interval;
pub mod panel;
pub mod pcm;
pub mod persistence;
pub mod rig;
pub mod sequencer;
pub mod series;
pub mod signal_state;
pub mod transport;

pub use calibration::*;
pub use clocks::*;
pub use config::RigConfig;
pub use detector::*;
pub use emitter::*;
pub use error::*;
pub use gpio::*;
pub use interval::*;
pub use panel::*;
pub use pcm::*;
pub use persistence::*;
pub use rig::*;
pub use sequencer::*;
pub use series::*;
pub use signal_state::*;
pub use transport::*;
