// Pin-less device accumulating travelled distance written into it
use crate::device::{DeviceCore, Sensor};
use crate::error::{DeviceError, Result};
use crate::messages::Reading;

pub struct Odometer {
    core: DeviceCore,
    mileage: f32,
}

impl Odometer {
    pub fn new() -> Self {
        Self {
            core: DeviceCore::new("Odometer", Vec::new()),
            mileage: 0.0,
        }
    }
}

impl Default for Odometer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for Odometer {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    /// Distance accumulated so far, in meters
    fn read(&mut self) -> Result<Reading> {
        self.core.ensure_readable("read")?;
        Ok(Reading::Scalar(self.mileage))
    }

    /// Add a distance increment (meters)
    fn write(&mut self, payload: Reading) -> Result<()> {
        self.core.ensure_readable("write")?;
        match payload {
            Reading::Scalar(distance) => {
                self.mileage += distance;
                Ok(())
            }
            _ => Err(DeviceError::Unsupported {
                tag: self.core.name().to_string(),
                operation: "non-scalar write",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_distance() {
        let mut odometer = Odometer::new();
        odometer.initialize(&[]).unwrap();
        odometer.write(Reading::Scalar(1.5)).unwrap();
        odometer.write(Reading::Scalar(2.0)).unwrap();
        assert_eq!(odometer.read().unwrap(), Reading::Scalar(3.5));
    }

    #[test]
    fn test_rejects_write_before_initialize() {
        let mut odometer = Odometer::new();
        assert!(odometer.write(Reading::Scalar(1.0)).is_err());
    }

    #[test]
    fn test_rejects_non_scalar_payload() {
        let mut odometer = Odometer::new();
        odometer.initialize(&[]).unwrap();
        assert!(matches!(
            odometer.write(Reading::Snapshot(Vec::new())),
            Err(DeviceError::Unsupported { .. })
        ));
    }
}
