// Hardware line access used by the concrete sensors
//
// Pin wiring and timer setup live outside this crate; sensors only see these
// traits. `IdleLines` stands in when no line backend is wired up.

use std::time::Instant;

use crate::device::Pin;

/// Full-scale value of the 10-bit analog converter
pub const ANALOG_FULL_SCALE: f32 = 1023.0;

pub trait DigitalInput {
    /// True while the line is pulled LOW (pulse active)
    fn is_low(&mut self, pin: Pin) -> bool;
}

pub trait AnalogInput {
    /// Raw converter value in 0..=1023
    fn read_raw(&mut self, pin: Pin) -> u16;
}

/// Millisecond time source driving debounce decisions
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Lines that never pulse and hold a fixed analog level
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleLines {
    pub analog_level: u16,
}

impl DigitalInput for IdleLines {
    fn is_low(&mut self, _pin: Pin) -> bool {
        false
    }
}

impl AnalogInput for IdleLines {
    fn read_raw(&mut self, _pin: Pin) -> u16 {
        self.analog_level
    }
}
