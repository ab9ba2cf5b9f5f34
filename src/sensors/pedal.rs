// Pedal position from an analog potentiometer
use crate::device::{DeviceCore, Pin, Sensor};
use crate::error::Result;
use crate::hal::{ANALOG_FULL_SCALE, AnalogInput};
use crate::messages::Reading;

pub struct Pedal {
    core: DeviceCore,
    input: Box<dyn AnalogInput>,
    rest_value: f32,
    max_value: f32,
}

impl Pedal {
    /// `rest_value` and `max_value` are normalized (0..1) calibration points
    pub fn new(
        pins: Vec<Pin>,
        input: Box<dyn AnalogInput>,
        rest_value: f32,
        max_value: f32,
    ) -> Result<Self> {
        let core = DeviceCore::new("Pedal", pins);
        core.pins_check(1)?;
        Ok(Self {
            core,
            input,
            rest_value,
            max_value,
        })
    }
}

impl Sensor for Pedal {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    /// Travel as a fraction of full press (0 at rest)
    fn read(&mut self) -> Result<Reading> {
        self.core.ensure_readable("read")?;
        let raw = self.input.read_raw(self.core.pins()[0]);
        let normalized = raw as f32 / ANALOG_FULL_SCALE;
        Ok(Reading::Scalar((normalized - self.rest_value) / self.max_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::IdleLines;

    #[test]
    fn test_pedal_travel() {
        let lines = IdleLines { analog_level: 511 };
        let mut pedal = Pedal::new(vec![14], Box::new(lines), 0.1, 0.8).unwrap();
        pedal.initialize(&[]).unwrap();
        let travel = pedal.read().unwrap().as_scalar().unwrap();
        // (511 / 1023 - 0.1) / 0.8
        assert!((travel - 0.49939).abs() < 1e-4);
    }

    #[test]
    fn test_pedal_at_rest() {
        let lines = IdleLines { analog_level: 0 };
        let mut pedal = Pedal::new(vec![14], Box::new(lines), 0.0, 1.0).unwrap();
        pedal.initialize(&[]).unwrap();
        assert_eq!(pedal.read().unwrap(), Reading::Scalar(0.0));
    }

    #[test]
    fn test_pedal_needs_a_pin() {
        assert!(Pedal::new(vec![], Box::new(IdleLines::default()), 0.0, 1.0).is_err());
    }
}
