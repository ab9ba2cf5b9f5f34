// Wheel speed from a hall-effect pulse line
//
// A pulse is the line reading LOW. Speed is derived from the interval between
// the last two counted pulses: rpm = 60000 / interval_ms.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BOUNCE_TIME_MS, STALL_TIMEOUT_MS};
use crate::device::{DeviceCore, OnUpdate, Pin, Sensor};
use crate::error::Result;
use crate::hal::{Clock, DigitalInput};
use crate::messages::Reading;

/// How repeated LOW readings are turned into counted pulses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Debounce {
    /// Count a LOW reading only if `interval_ms` passed since the last pulse
    TimeGated { interval_ms: u64 },
    /// Count only the HIGH -> LOW transition between consecutive polls
    Edge,
}

impl Default for Debounce {
    fn default() -> Self {
        Debounce::TimeGated {
            interval_ms: BOUNCE_TIME_MS,
        }
    }
}

pub struct WheelSpeedSensor {
    core: DeviceCore,
    line: Box<dyn DigitalInput>,
    clock: Box<dyn Clock>,
    debounce: Debounce,
    stall_timeout_ms: u64,
    last_pulse: Option<u64>,
    prev_pulse: Option<u64>,
    was_low: bool,
    on_update: Option<OnUpdate<f32>>,
}

impl WheelSpeedSensor {
    /// Create a sensor bound to exactly one pulse pin
    pub fn new(pins: Vec<Pin>, line: Box<dyn DigitalInput>, clock: Box<dyn Clock>) -> Result<Self> {
        let core = DeviceCore::new("WheelSpeedSensor", pins);
        core.pins_check(1)?;
        Ok(Self {
            core,
            line,
            clock,
            debounce: Debounce::default(),
            stall_timeout_ms: STALL_TIMEOUT_MS,
            last_pulse: None,
            prev_pulse: None,
            was_low: false,
            on_update: None,
        })
    }

    pub fn with_debounce(mut self, debounce: Debounce) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_stall_timeout(mut self, stall_timeout_ms: u64) -> Self {
        self.stall_timeout_ms = stall_timeout_ms;
        self
    }

    /// Install a handler called with the new speed whenever a pulse is counted
    pub fn on_update(mut self, handler: impl FnMut(f32) + 'static) -> Self {
        self.on_update = Some(Box::new(handler));
        self
    }

    fn accept_pulse(&self, now: u64, low: bool) -> bool {
        if !low {
            return false;
        }
        match self.debounce {
            Debounce::TimeGated { interval_ms } => self
                .last_pulse
                .is_none_or(|last| now.saturating_sub(last) > interval_ms),
            Debounce::Edge => !self.was_low,
        }
    }

    /// Current speed in rpm; 0 until two pulses were seen or once the wheel stalls
    fn rpm(&self, now: u64) -> f32 {
        match (self.prev_pulse, self.last_pulse) {
            (Some(prev), Some(last))
                if last > prev && now.saturating_sub(last) <= self.stall_timeout_ms =>
            {
                60_000.0 / (last - prev) as f32
            }
            _ => 0.0,
        }
    }
}

impl Sensor for WheelSpeedSensor {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn read(&mut self) -> Result<Reading> {
        self.core.ensure_readable("read")?;
        let now = self.clock.now_ms();
        let pin = self.core.pins()[0];
        let low = self.line.is_low(pin);

        if self.accept_pulse(now, low) {
            self.prev_pulse = self.last_pulse;
            self.last_pulse = Some(now);
            let rpm = self.rpm(now);
            debug!("Pulse on {} at {}ms: {:.1} rpm", self.core.name(), now, rpm);
            if let Some(handler) = self.on_update.as_mut() {
                handler(rpm);
            }
        }
        self.was_low = low;

        Ok(Reading::Scalar(self.rpm(now)))
    }
}
