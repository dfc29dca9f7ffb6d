// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;
use std::time::Duration;

use crate::core::{
    Direction, GpioBackend, LatencyError, Level, PinNumber, Result, SignalEmitter, SignalState,
    StreamFormat, TransportKind,
};

/// Square pulse on the line-out GPIO pin.
///
/// The start tick comes from the rising-edge callback of the line-out pin
/// itself, so scheduling jitter between "decide to write" and "pin went high"
/// does not end up in the sample.
pub struct LineLevelEmitter {
    gpio: Arc<dyn GpioBackend>,
    line_out: PinNumber,
    signal_length: Duration,
    open: bool,
}

impl LineLevelEmitter {
    pub fn new(gpio: Arc<dyn GpioBackend>, line_out: PinNumber, signal_length: Duration) -> Self {
        Self {
            gpio,
            line_out,
            signal_length,
            open: false,
        }
    }

    fn unavailable(&self, cause: LatencyError) -> LatencyError {
        tracing::error!(pin = self.line_out, "line-out unavailable: {}", cause);
        LatencyError::TransportUnavailable {
            transport: TransportKind::LineLevel,
            tried: vec![format!("gpio{}", self.line_out)],
        }
    }
}

impl SignalEmitter for LineLevelEmitter {
    fn kind(&self) -> TransportKind {
        TransportKind::LineLevel
    }

    fn open(&mut self, state: Arc<SignalState>) -> Result<StreamFormat> {
        let pin = self.line_out;
        self.gpio
            .set_direction(pin, Direction::Output)
            .and_then(|_| self.gpio.write(pin, Level::Low))
            .map_err(|e| self.unavailable(e))?;

        self.gpio
            .on_rising_edge(
                pin,
                Box::new(move |edge| {
                    tracing::trace!(pin = edge.pin, tick = edge.tick, "line-out rising edge");
                    state.arm(edge.tick);
                }),
            )
            .map_err(|e| self.unavailable(e))?;

        self.open = true;
        tracing::debug!(pin, "line-level emitter open");
        Ok(StreamFormat::default())
    }

    fn emit(&mut self) -> Result<()> {
        if !self.open {
            return Err(LatencyError::Gpio("line-level emitter is not open".into()));
        }
        self.gpio.write(self.line_out, Level::High)?;
        std::thread::sleep(self.signal_length);
        self.gpio.write(self.line_out, Level::Low)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.gpio.clear_edge_handler(self.line_out)?;
        self.gpio.write(self.line_out, Level::Low)
    }
}
