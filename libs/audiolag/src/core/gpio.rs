// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GPIO capability consumed by the measurement core.

use crate::core::{Result, Tick, TickSource};

/// BCM pin number.
pub type PinNumber = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A level change reported by the platform, stamped with the hardware tick
/// at which it happened (not the time the callback ran).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub pin: PinNumber,
    pub level: Level,
    pub tick: Tick,
}

impl EdgeEvent {
    pub fn rising(pin: PinNumber, tick: Tick) -> Self {
        Self {
            pin,
            level: Level::High,
            tick,
        }
    }
}

/// Callback invoked on the platform's edge thread.
pub type EdgeHandler = Box<dyn FnMut(EdgeEvent) + Send + 'static>;

/// GPIO access shared by the emitter, sequencer and control panel.
///
/// All methods take `&self`; implementations keep their pin tables behind a
/// lock so one backend can be shared through an `Arc`.
///
/// Edge handlers run on a thread owned by the backend and may run between
/// any two instructions of the caller. Registering a handler for a pin
/// replaces the previous one.
pub trait GpioBackend: TickSource {
    fn set_direction(&self, pin: PinNumber, direction: Direction) -> Result<()>;

    fn write(&self, pin: PinNumber, level: Level) -> Result<()>;

    fn read(&self, pin: PinNumber) -> Result<Level>;

    /// Deliver rising edges of `pin` to `handler`.
    ///
    /// Output pins are supported too: line-level emission timestamps the
    /// rising edge of the line-out pin through this callback.
    fn on_rising_edge(&self, pin: PinNumber, handler: EdgeHandler) -> Result<()>;

    fn clear_edge_handler(&self, pin: PinNumber) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert!(Level::High.is_high());
        assert!(!Level::Low.is_high());
    }

    #[test]
    fn test_rising_edge_constructor() {
        let edge = EdgeEvent::rising(4, 1234);
        assert_eq!(edge.pin, 4);
        assert_eq!(edge.level, Level::High);
        assert_eq!(edge.tick, 1234);
    }
}
