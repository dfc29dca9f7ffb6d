// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::{
    Direction, EdgeEvent, EdgeHandler, GpioBackend, LatencyError, Level, PinNumber, Result,
    SoftwareTickSource, Tick, TickSource, micros_to_tick,
};

/// Behaviour of the simulated device under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutModel {
    /// Time from signal in to rising edge out.
    pub latency: Duration,
    /// Extra rising edges after the first one (transistor bounce).
    pub bounces: usize,
    pub bounce_spacing: Duration,
}

impl DutModel {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            bounces: 0,
            bounce_spacing: Duration::from_micros(50),
        }
    }

    pub fn bouncing(mut self, bounces: usize, spacing: Duration) -> Self {
        self.bounces = bounces;
        self.bounce_spacing = spacing;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct DutLink {
    line_out: PinNumber,
    line_in: PinNumber,
    model: DutModel,
}

type SharedHandler = Arc<Mutex<EdgeHandler>>;

struct Pin {
    direction: Direction,
    level: Level,
    handler: Option<SharedHandler>,
    high_writes: usize,
}

impl Default for Pin {
    fn default() -> Self {
        Self {
            direction: Direction::Input,
            level: Level::Low,
            handler: None,
            high_writes: 0,
        }
    }
}

struct Inner {
    ticks: SoftwareTickSource,
    pins: Mutex<HashMap<PinNumber, Pin>>,
    failing: Mutex<HashSet<PinNumber>>,
    dut: Mutex<Option<DutLink>>,
}

/// In-memory GPIO backend with a microsecond tick counter.
///
/// Handlers run on the thread that caused the edge (the writer, or a DUT
/// delivery thread), looked up at fire time so a cleared handler is never
/// called.
#[derive(Clone)]
pub struct SimulatedGpio {
    inner: Arc<Inner>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Tick counter starting at `tick`; values near `u32::MAX` exercise
    /// wraparound.
    pub fn starting_at(tick: Tick) -> Self {
        Self {
            inner: Arc::new(Inner {
                ticks: SoftwareTickSource::starting_at(tick),
                pins: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashSet::new()),
                dut: Mutex::new(None),
            }),
        }
    }

    /// Loop `line_out` back to `line_in` through `model`.
    pub fn connect_dut(&self, line_out: PinNumber, line_in: PinNumber, model: DutModel) {
        *self.inner.dut.lock() = Some(DutLink {
            line_out,
            line_in,
            model,
        });
    }

    /// Feed a signal into the DUT now, as an audio interface would.
    ///
    /// No-op without a connected DUT.
    pub fn signal_dut(&self) {
        let Some(link) = *self.inner.dut.lock() else {
            return;
        };
        self.schedule_return(link, self.current_tick());
    }

    /// Make every subsequent operation on `pin` fail.
    pub fn fail_pin(&self, pin: PinNumber) {
        self.inner.failing.lock().insert(pin);
    }

    /// Deliver an edge on `pin` with an explicit tick.
    pub fn inject_edge(&self, pin: PinNumber, level: Level, tick: Tick) {
        self.fire(EdgeEvent { pin, level, tick });
    }

    /// Hold an input pin high (a pressed button).
    pub fn press(&self, pin: PinNumber) {
        self.set_input_level(pin, Level::High);
    }

    pub fn release(&self, pin: PinNumber) {
        self.set_input_level(pin, Level::Low);
    }

    pub fn level(&self, pin: PinNumber) -> Level {
        self.inner
            .pins
            .lock()
            .get(&pin)
            .map(|p| p.level)
            .unwrap_or(Level::Low)
    }

    pub fn direction(&self, pin: PinNumber) -> Option<Direction> {
        self.inner.pins.lock().get(&pin).map(|p| p.direction)
    }

    /// Number of low-to-high transitions written to `pin`.
    pub fn high_writes(&self, pin: PinNumber) -> usize {
        self.inner
            .pins
            .lock()
            .get(&pin)
            .map(|p| p.high_writes)
            .unwrap_or(0)
    }

    pub fn has_edge_handler(&self, pin: PinNumber) -> bool {
        self.inner
            .pins
            .lock()
            .get(&pin)
            .is_some_and(|p| p.handler.is_some())
    }

    fn check(&self, pin: PinNumber) -> Result<()> {
        if self.inner.failing.lock().contains(&pin) {
            return Err(LatencyError::Gpio(format!("gpio{} unavailable", pin)));
        }
        Ok(())
    }

    fn set_input_level(&self, pin: PinNumber, level: Level) {
        let rising = {
            let mut pins = self.inner.pins.lock();
            let p = pins.entry(pin).or_default();
            let rising = p.level == Level::Low && level == Level::High;
            p.level = level;
            rising
        };
        if rising {
            self.fire(EdgeEvent::rising(pin, self.current_tick()));
        }
    }

    fn fire(&self, edge: EdgeEvent) {
        // Pin table lock is released before the handler runs.
        let handler = self
            .inner
            .pins
            .lock()
            .get(&edge.pin)
            .and_then(|p| p.handler.clone());
        if let Some(handler) = handler {
            let mut handler = handler.lock();
            (*handler)(edge);
        }
    }

    fn schedule_return(&self, link: DutLink, start_tick: Tick) {
        let gpio = self.clone();
        let spawned = std::thread::Builder::new()
            .name("sim-dut".to_string())
            .spawn(move || {
                let model = link.model;
                std::thread::sleep(model.latency);
                let first = start_tick.wrapping_add(micros_to_tick(model.latency.as_micros()));
                gpio.inject_edge(link.line_in, Level::High, first);

                for bounce in 1..=model.bounces {
                    std::thread::sleep(model.bounce_spacing);
                    let offset = micros_to_tick(model.bounce_spacing.as_micros() * bounce as u128);
                    gpio.inject_edge(link.line_in, Level::High, first.wrapping_add(offset));
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn simulated DUT thread: {}", e);
        }
    }
}

impl TickSource for SimulatedGpio {
    fn current_tick(&self) -> Tick {
        self.inner.ticks.current_tick()
    }

    fn description(&self) -> &str {
        self.inner.ticks.description()
    }
}

impl GpioBackend for SimulatedGpio {
    fn set_direction(&self, pin: PinNumber, direction: Direction) -> Result<()> {
        self.check(pin)?;
        self.inner.pins.lock().entry(pin).or_default().direction = direction;
        Ok(())
    }

    fn write(&self, pin: PinNumber, level: Level) -> Result<()> {
        self.check(pin)?;
        let tick = self.current_tick();
        let rising = {
            let mut pins = self.inner.pins.lock();
            let p = pins.entry(pin).or_default();
            let rising = p.level == Level::Low && level == Level::High;
            if rising {
                p.high_writes += 1;
            }
            p.level = level;
            rising
        };

        if rising {
            self.fire(EdgeEvent::rising(pin, tick));
            let link = *self.inner.dut.lock();
            if let Some(link) = link.filter(|l| l.line_out == pin) {
                self.schedule_return(link, tick);
            }
        }
        Ok(())
    }

    fn read(&self, pin: PinNumber) -> Result<Level> {
        self.check(pin)?;
        Ok(self.level(pin))
    }

    fn on_rising_edge(&self, pin: PinNumber, handler: EdgeHandler) -> Result<()> {
        self.check(pin)?;
        self.inner.pins.lock().entry(pin).or_default().handler =
            Some(Arc::new(Mutex::new(handler)));
        Ok(())
    }

    fn clear_edge_handler(&self, pin: PinNumber) -> Result<()> {
        self.check(pin)?;
        if let Some(p) = self.inner.pins.lock().get_mut(&pin) {
            p.handler = None;
        }
        Ok(())
    }
}
