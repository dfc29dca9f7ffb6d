// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Button and LED front panel of the measurement board.
//!
//! Buttons are polled, not interrupt driven: the line-in edge callback is
//! the only latency-critical input. Every button press is handled once and
//! then waited out until release.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::PinConfig;
use crate::core::{
    CancelToken, Direction, GpioBackend, Level, PinNumber, Result, Rig, RunningStats,
    SignalQuality, TransportKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelInput {
    StartMeasurement,
    StartCalibration,
    SelectMode(TransportKind),
    CycleDisplay,
}

/// Which statistic of the latest run is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Average,
    Maximum,
    Minimum,
}

impl DisplayMode {
    pub fn next(self) -> Self {
        match self {
            DisplayMode::Average => DisplayMode::Maximum,
            DisplayMode::Maximum => DisplayMode::Minimum,
            DisplayMode::Minimum => DisplayMode::Average,
        }
    }

    pub fn value(self, stats: &RunningStats) -> Option<u32> {
        match self {
            DisplayMode::Average => stats.avg_latency_us(),
            DisplayMode::Maximum => stats.max_latency_us(),
            DisplayMode::Minimum => stats.min_latency_us(),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::Average => write!(f, "average"),
            DisplayMode::Maximum => write!(f, "maximum"),
            DisplayMode::Minimum => write!(f, "minimum"),
        }
    }
}

pub struct ControlPanel {
    gpio: Arc<dyn GpioBackend>,
    pins: PinConfig,
    poll_interval: Duration,
    mode: TransportKind,
    display: DisplayMode,
    last_stats: Option<RunningStats>,
}

impl ControlPanel {
    pub fn new(gpio: Arc<dyn GpioBackend>, pins: PinConfig, poll_interval: Duration) -> Self {
        Self {
            gpio,
            pins,
            poll_interval,
            mode: TransportKind::LineLevel,
            display: DisplayMode::default(),
            last_stats: None,
        }
    }

    pub fn for_rig(rig: &Rig) -> Self {
        Self::new(
            Arc::clone(rig.gpio()),
            rig.config().pins.clone(),
            rig.config().panel_poll_interval(),
        )
    }

    pub fn mode(&self) -> TransportKind {
        self.mode
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display
    }

    pub fn last_stats(&self) -> Option<&RunningStats> {
        self.last_stats.as_ref()
    }

    /// Buttons in handling priority order.
    fn buttons(&self) -> Vec<(PinNumber, PanelInput)> {
        let p = &self.pins;
        let mut buttons = vec![
            (p.start_measurement_button, PanelInput::StartMeasurement),
            (p.calibration_button, PanelInput::StartCalibration),
            (
                p.line_mode_button,
                PanelInput::SelectMode(TransportKind::LineLevel),
            ),
            (
                p.usb_mode_button,
                PanelInput::SelectMode(TransportKind::UsbPcm),
            ),
            (
                p.hdmi_mode_button,
                PanelInput::SelectMode(TransportKind::HdmiPcm),
            ),
            (
                p.pcie_mode_button,
                PanelInput::SelectMode(TransportKind::PciePcm),
            ),
        ];
        if let Some(pin) = p.display_mode_button {
            buttons.push((pin, PanelInput::CycleDisplay));
        }
        buttons
    }

    fn mode_led(&self, kind: TransportKind) -> PinNumber {
        match kind {
            TransportKind::LineLevel => self.pins.line_mode_led,
            TransportKind::UsbPcm => self.pins.usb_mode_led,
            TransportKind::HdmiPcm => self.pins.hdmi_mode_led,
            TransportKind::PciePcm => self.pins.pcie_mode_led,
        }
    }

    fn leds(&self) -> [PinNumber; 8] {
        let p = &self.pins;
        [
            p.start_measurement_led,
            p.calibration_green_led,
            p.calibration_yellow_led,
            p.calibration_red_led,
            p.line_mode_led,
            p.usb_mode_led,
            p.hdmi_mode_led,
            p.pcie_mode_led,
        ]
    }

    /// Configure pin directions, switch every LED off, light the current
    /// mode LED.
    pub fn init(&mut self) -> Result<()> {
        for (pin, _) in self.buttons() {
            self.gpio.set_direction(pin, Direction::Input)?;
        }
        for pin in self.leds() {
            self.gpio.set_direction(pin, Direction::Output)?;
            self.gpio.write(pin, Level::Low)?;
        }
        self.select_mode(self.mode)
    }

    /// First pressed button, by priority.
    pub fn poll(&self) -> Result<Option<PanelInput>> {
        for (pin, input) in self.buttons() {
            if self.gpio.read(pin)?.is_high() {
                return Ok(Some(input));
            }
        }
        Ok(None)
    }

    pub fn select_mode(&mut self, kind: TransportKind) -> Result<()> {
        for other in TransportKind::ALL {
            self.gpio.write(self.mode_led(other), Level::Low)?;
        }
        self.gpio.write(self.mode_led(kind), Level::High)?;
        if self.mode != kind {
            tracing::info!(transport = %kind, "Mode selected");
        }
        self.mode = kind;
        Ok(())
    }

    /// Calibration LEDs for `quality`; `None` switches all three off.
    pub fn show_quality(&self, quality: Option<SignalQuality>) -> Result<()> {
        let (green, yellow, red) = quality.map_or((false, false, false), SignalQuality::leds);
        self.gpio
            .write(self.pins.calibration_green_led, Level::from(green))?;
        self.gpio
            .write(self.pins.calibration_yellow_led, Level::from(yellow))?;
        self.gpio
            .write(self.pins.calibration_red_led, Level::from(red))
    }

    pub fn set_running(&self, running: bool) -> Result<()> {
        self.gpio
            .write(self.pins.start_measurement_led, Level::from(running))
    }

    /// Advance the display mode and return the value now shown.
    pub fn cycle_display(&mut self) -> Option<u32> {
        self.display = self.display.next();
        let value = self.last_stats.as_ref().and_then(|s| self.display.value(s));
        tracing::info!(display = %self.display, value_us = ?value, "Display mode");
        value
    }

    /// Any button except calibration is held.
    fn other_button_pressed(&self) -> Result<bool> {
        for (pin, input) in self.buttons() {
            if input != PanelInput::StartCalibration && self.gpio.read(pin)?.is_high() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn wait_for_release(&self, cancel: &CancelToken) -> Result<()> {
        while !cancel.is_cancelled() && self.poll()?.is_some() {
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    /// Act on one input. Run failures are logged and leave the panel usable;
    /// GPIO failures on the panel itself are returned.
    pub fn handle(&mut self, rig: &Rig, input: PanelInput, cancel: &CancelToken) -> Result<()> {
        match input {
            PanelInput::StartMeasurement => {
                self.wait_for_release(cancel)?;
                self.measure(rig, cancel)
            }
            PanelInput::StartCalibration => {
                self.wait_for_release(cancel)?;
                self.calibrate_continuously(rig, cancel)
            }
            PanelInput::SelectMode(kind) => {
                self.select_mode(kind)?;
                self.wait_for_release(cancel)
            }
            PanelInput::CycleDisplay => {
                self.cycle_display();
                self.wait_for_release(cancel)
            }
        }
    }

    fn measure(&mut self, rig: &Rig, cancel: &CancelToken) -> Result<()> {
        self.set_running(true)?;
        let outcome = rig.measure(self.mode, cancel);
        self.set_running(false)?;

        match outcome {
            Ok((report, path)) => {
                let shown = self.display.value(&report.stats);
                tracing::info!(
                    transport = %self.mode,
                    valid = report.valid_count(),
                    display = %self.display,
                    value_us = ?shown,
                    path = ?path,
                    "Measurement done"
                );
                self.last_stats = Some(report.stats);
            }
            Err(e) => tracing::error!(transport = %self.mode, "Measurement failed: {}", e),
        }
        Ok(())
    }

    /// Repeat calibration runs until another button is pressed.
    fn calibrate_continuously(&mut self, rig: &Rig, cancel: &CancelToken) -> Result<()> {
        tracing::info!(transport = %self.mode, "Continuous calibration started");

        while !cancel.is_cancelled() && !self.other_button_pressed()? {
            match rig.calibrate(self.mode, cancel) {
                Ok((report, Some(quality))) => {
                    self.show_quality(Some(quality))?;
                    self.last_stats = Some(report.stats);
                }
                Ok((_, None)) => break,
                Err(e) => {
                    tracing::error!(transport = %self.mode, "Calibration failed: {}", e);
                    break;
                }
            }
        }

        self.show_quality(None)?;
        tracing::info!("Continuous calibration stopped");
        Ok(())
    }

    /// Poll buttons until `cancel`, then switch every LED off.
    pub fn run_loop(&mut self, rig: &Rig, cancel: &CancelToken) -> Result<()> {
        self.init()?;
        tracing::info!(mode = %self.mode, "Control panel ready");

        while !cancel.is_cancelled() {
            match self.poll()? {
                Some(input) => self.handle(rig, input, cancel)?,
                None => std::thread::sleep(self.poll_interval),
            }
        }

        for pin in self.leds() {
            self.gpio.write(pin, Level::Low)?;
        }
        Ok(())
    }
}
