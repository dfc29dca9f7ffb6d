// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::HashMap;

use parking_lot::Mutex;
use rppal::gpio::{Event, Gpio, InputPin, OutputPin, Trigger};

use crate::core::{
    Direction, EdgeEvent, EdgeHandler, GpioBackend, LatencyError, Level, PinNumber, Result, Tick,
    TickSource, micros_to_tick,
};
use crate::linux::MonotonicTickSource;

enum PinHandle {
    Input(InputPin),
    Output(OutputPin),
}

fn gpio_err(pin: PinNumber, e: impl std::fmt::Display) -> LatencyError {
    LatencyError::Gpio(format!("gpio{}: {}", pin, e))
}

fn to_level(level: rppal::gpio::Level) -> Level {
    Level::from(level == rppal::gpio::Level::High)
}

/// GPIO through `/dev/gpiochip*`.
///
/// Input edges come from the kernel line-event queue and carry its
/// `CLOCK_MONOTONIC` timestamp. Output pins have no kernel edge events, so a
/// rising edge on an output pin is reported by `write` itself, stamped
/// immediately after the level change.
pub struct RppalGpio {
    gpio: Gpio,
    pins: Mutex<HashMap<PinNumber, PinHandle>>,
    output_handlers: Mutex<HashMap<PinNumber, EdgeHandler>>,
    ticks: MonotonicTickSource,
}

impl RppalGpio {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| LatencyError::Gpio(e.to_string()))?;
        tracing::info!("GPIO character device opened");
        Ok(Self {
            gpio,
            pins: Mutex::new(HashMap::new()),
            output_handlers: Mutex::new(HashMap::new()),
            ticks: MonotonicTickSource::new(),
        })
    }
}

impl TickSource for RppalGpio {
    fn current_tick(&self) -> Tick {
        self.ticks.current_tick()
    }

    fn description(&self) -> &str {
        self.ticks.description()
    }
}

impl GpioBackend for RppalGpio {
    fn set_direction(&self, pin: PinNumber, direction: Direction) -> Result<()> {
        let mut pins = self.pins.lock();
        match (pins.get(&pin), direction) {
            (Some(PinHandle::Input(_)), Direction::Input)
            | (Some(PinHandle::Output(_)), Direction::Output) => return Ok(()),
            _ => {}
        }
        // Releasing the old handle frees the line for re-acquisition.
        pins.remove(&pin);

        let raw = self.gpio.get(pin).map_err(|e| gpio_err(pin, e))?;
        let handle = match direction {
            Direction::Input => PinHandle::Input(raw.into_input()),
            Direction::Output => PinHandle::Output(raw.into_output_low()),
        };
        pins.insert(pin, handle);
        tracing::debug!(pin, ?direction, "pin configured");
        Ok(())
    }

    fn write(&self, pin: PinNumber, level: Level) -> Result<()> {
        let (rising, tick) = {
            let mut pins = self.pins.lock();
            let Some(PinHandle::Output(out)) = pins.get_mut(&pin) else {
                return Err(gpio_err(pin, "not configured as output"));
            };
            let was_high = out.is_set_high();
            match level {
                Level::High => out.set_high(),
                Level::Low => out.set_low(),
            }
            (!was_high && level.is_high(), self.ticks.current_tick())
        };

        if rising {
            if let Some(handler) = self.output_handlers.lock().get_mut(&pin) {
                handler(EdgeEvent::rising(pin, tick));
            }
        }
        Ok(())
    }

    fn read(&self, pin: PinNumber) -> Result<Level> {
        match self.pins.lock().get(&pin) {
            Some(PinHandle::Input(input)) => Ok(to_level(input.read())),
            Some(PinHandle::Output(out)) => Ok(Level::from(out.is_set_high())),
            None => Err(gpio_err(pin, "not configured")),
        }
    }

    fn on_rising_edge(&self, pin: PinNumber, mut handler: EdgeHandler) -> Result<()> {
        let mut pins = self.pins.lock();
        match pins.get_mut(&pin) {
            Some(PinHandle::Input(input)) => input
                .set_async_interrupt(Trigger::RisingEdge, None, move |event: Event| {
                    let tick = micros_to_tick(event.timestamp.as_micros());
                    handler(EdgeEvent::rising(pin, tick));
                })
                .map_err(|e| gpio_err(pin, e)),
            Some(PinHandle::Output(_)) => {
                self.output_handlers.lock().insert(pin, handler);
                Ok(())
            }
            None => Err(gpio_err(pin, "not configured")),
        }
    }

    fn clear_edge_handler(&self, pin: PinNumber) -> Result<()> {
        let mut pins = self.pins.lock();
        match pins.get_mut(&pin) {
            Some(PinHandle::Input(input)) => {
                input.clear_async_interrupt().map_err(|e| gpio_err(pin, e))
            }
            _ => {
                self.output_handlers.lock().remove(&pin);
                Ok(())
            }
        }
    }
}
