// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hardware collaborators.
//!
//! The runtime never touches registers itself. Pin I/O goes through [`Hal`]
//! and time through [`Clock`]; a board support package implements both for
//! its target. [`SimulatedHal`], [`ManualClock`] and [`SystemClock`] are the
//! host implementations used by tests and the simulator.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Not;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Pin identifier (GPIO number, ADC channel, ...).
pub type PinId = u32;

/// Pin direction / pull configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinMode {
    /// Floating input.
    Input,
    /// Input with internal pull-up (reads high when open).
    InputPullup,
    /// Push-pull output.
    Output,
}

/// Digital logic level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    /// `true` for [`Level::High`].
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

/// Hardware I/O capability consumed by modules.
///
/// Implementations must not block: every call is made from the single
/// cooperative poll loop.
pub trait Hal: Send + Sync {
    /// Configure pin direction.
    fn pin_mode(&self, pin: PinId, mode: PinMode);

    /// Read a digital input.
    fn digital_read(&self, pin: PinId) -> Level;

    /// Drive a digital output.
    fn digital_write(&self, pin: PinId, level: Level);

    /// Sample an analog input.
    fn analog_read(&self, pin: PinId) -> u16;

    /// Drive an analog (DAC/PWM) output.
    fn analog_write(&self, pin: PinId, value: u16);
}

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by [`Instant`], origin at construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Software clock advanced by hand (tests, deterministic simulation).
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Advance by `ms` and return the new time.
    pub fn advance(&self, ms: u64) -> u64 {
        self.now_ms.fetch_add(ms, Ordering::Relaxed) + ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

/// Observed state of one simulated pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    pub mode: Option<PinMode>,
    pub level: Level,
    pub analog: u16,
    /// Number of `digital_write` calls that changed the level.
    pub transitions: u32,
}

impl Default for PinState {
    fn default() -> Self {
        Self {
            mode: None,
            level: Level::Low,
            analog: 0,
            transitions: 0,
        }
    }
}

/// In-memory pin bank.
///
/// Outputs record what modules drive; inputs are set from the outside with
/// [`SimulatedHal::set_input`]. An input-pullup pin that nobody has driven
/// reads high, like the real thing.
#[derive(Debug, Default)]
pub struct SimulatedHal {
    pins: Mutex<HashMap<PinId, PinState>>,
}

impl SimulatedHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the level seen by `digital_read` (button presses, sensors).
    pub fn set_input(&self, pin: PinId, level: Level) {
        self.pins.lock().entry(pin).or_default().level = level;
    }

    /// Force the value seen by `analog_read`.
    pub fn set_analog_input(&self, pin: PinId, value: u16) {
        self.pins.lock().entry(pin).or_default().analog = value;
    }

    /// Snapshot of a pin, `None` if it was never touched.
    pub fn pin(&self, pin: PinId) -> Option<PinState> {
        self.pins.lock().get(&pin).copied()
    }

    /// Current digital level of a pin (low if untouched).
    pub fn level(&self, pin: PinId) -> Level {
        self.pin(pin).map(|p| p.level).unwrap_or_default()
    }

    /// Level transitions driven on a pin so far.
    pub fn transitions(&self, pin: PinId) -> u32 {
        self.pin(pin).map(|p| p.transitions).unwrap_or(0)
    }
}

impl Hal for SimulatedHal {
    fn pin_mode(&self, pin: PinId, mode: PinMode) {
        let mut pins = self.pins.lock();
        let state = pins.entry(pin).or_default();
        state.mode = Some(mode);
        if mode == PinMode::InputPullup {
            state.level = Level::High;
        }
    }

    fn digital_read(&self, pin: PinId) -> Level {
        self.level(pin)
    }

    fn digital_write(&self, pin: PinId, level: Level) {
        let mut pins = self.pins.lock();
        let state = pins.entry(pin).or_default();
        if state.level != level {
            state.transitions += 1;
        }
        state.level = level;
    }

    fn analog_read(&self, pin: PinId) -> u16 {
        self.pin(pin).map(|p| p.analog).unwrap_or(0)
    }

    fn analog_write(&self, pin: PinId, value: u16) {
        self.pins.lock().entry(pin).or_default().analog = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_ms(), 100);
        assert_eq!(clock.advance(25), 125);
        clock.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_pullup_reads_high() {
        let hal = SimulatedHal::new();
        hal.pin_mode(4, PinMode::InputPullup);
        assert_eq!(hal.digital_read(4), Level::High);

        hal.set_input(4, Level::Low);
        assert_eq!(hal.digital_read(4), Level::Low);
    }

    #[test]
    fn test_transitions_count_changes_only() {
        let hal = SimulatedHal::new();
        hal.pin_mode(13, PinMode::Output);
        hal.digital_write(13, Level::Low);
        hal.digital_write(13, Level::High);
        hal.digital_write(13, Level::High);
        hal.digital_write(13, Level::Low);
        assert_eq!(hal.transitions(13), 2);
        assert_eq!(hal.pin(13).and_then(|p| p.mode), Some(PinMode::Output));
    }

    #[test]
    fn test_analog_roundtrip() {
        let hal = SimulatedHal::new();
        hal.analog_write(25, 512);
        assert_eq!(hal.analog_read(25), 512);
        assert_eq!(hal.analog_read(26), 0);
    }

    #[test]
    fn test_level_not() {
        assert_eq!(!Level::Low, Level::High);
        assert_eq!(Level::from(true), Level::High);
        assert!(!Level::Low.is_high());
    }
}
