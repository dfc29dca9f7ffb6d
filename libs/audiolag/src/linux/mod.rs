// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Raspberry Pi backends: GPIO through the character device (`rppal`),
//! playback through ALSA.

mod clock;
mod gpio;
mod pcm;

pub use clock::MonotonicTickSource;
pub use gpio::RppalGpio;
pub use pcm::AlsaPcm;
