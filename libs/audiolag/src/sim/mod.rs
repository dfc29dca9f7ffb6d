// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Software backends for running the rig without a Raspberry Pi.
//!
//! [`SimulatedGpio`] keeps a pin table and fires edge handlers the way the
//! character-device backend does. Connecting a [`DutModel`] turns it into a
//! loopback: every signal sent into the model comes back on the line-in pin
//! after the configured latency. [`SimulatedPcm`] routes its first period of
//! every burst into the same model.

mod gpio;
mod pcm;

pub use gpio::{DutModel, SimulatedGpio};
pub use pcm::SimulatedPcm;
