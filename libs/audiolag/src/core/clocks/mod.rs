// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod software_tick;
mod tick_source;

pub use software_tick::SoftwareTickSource;
pub use tick_source::{Tick, TickSource, micros_to_tick};
