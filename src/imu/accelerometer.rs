// Accelerometer device backed by the IMU's UART-RVC stream
//
// Each read polls the decoder once. The latest record is kept so the control
// loop always gets a value; the update handler only fires on fresh frames.

use tracing::info;

use super::rvc::{DecodeOutcome, DecoderStats, RvcDecoder};
use super::stream::{ByteStream, SerialStream};
use crate::device::{DeviceCore, OnUpdate, Sensor};
use crate::error::Result;
use crate::messages::{MotionRecord, Reading};

pub struct Accelerometer {
    core: DeviceCore,
    stream: Box<dyn ByteStream>,
    decoder: RvcDecoder,
    latest: MotionRecord,
    on_update: Option<OnUpdate<MotionRecord>>,
}

impl Accelerometer {
    pub fn new(stream: Box<dyn ByteStream>) -> Self {
        Self {
            core: DeviceCore::new("Accelerometer", Vec::new()),
            stream,
            decoder: RvcDecoder::new(),
            latest: MotionRecord::default(),
            on_update: None,
        }
    }

    /// Open the IMU on a serial port
    pub fn open(port: &str, baudrate: u32) -> Result<Self> {
        info!("Opening accelerometer on {}", port);
        let stream = SerialStream::open_with_baudrate(port, baudrate)?;
        Ok(Self::new(Box::new(stream)))
    }

    /// Install a handler called with every successfully decoded frame
    pub fn on_update(mut self, handler: impl FnMut(MotionRecord) + 'static) -> Self {
        self.on_update = Some(Box::new(handler));
        self
    }

    /// Poll the decoder once; `Some` only when a new frame was decoded
    pub fn poll(&mut self) -> Result<Option<MotionRecord>> {
        self.core.ensure_readable("read")?;
        match self.decoder.poll(&mut *self.stream) {
            DecodeOutcome::Record(record) => {
                self.latest = record;
                if let Some(handler) = self.on_update.as_mut() {
                    handler(record);
                }
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    /// Most recent record (all zeros before the first frame)
    pub fn latest(&self) -> MotionRecord {
        self.latest
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

impl Sensor for Accelerometer {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn check_initialize(&self) -> Result<()> {
        self.core.ensure_constructed("initialize")?;
        self.core.pins_check(0)
    }

    fn read(&mut self) -> Result<Reading> {
        self.poll()?;
        Ok(Reading::Motion(self.latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::error::DeviceError;
    use crate::imu::rvc::encode_frame;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    fn accelerometer_with(bytes: Vec<u8>) -> Accelerometer {
        Accelerometer::new(Box::new(VecDeque::from(bytes)))
    }

    #[test]
    fn test_read_before_initialize_fails() {
        let mut imu = accelerometer_with(Vec::new());
        assert!(matches!(imu.read(), Err(DeviceError::InvalidState { .. })));
    }

    #[test]
    fn test_handler_fires_only_on_decoded_frames() {
        let mut bytes = vec![0x00, 0x13];
        bytes.extend_from_slice(&encode_frame([500, -200, 0, 100, 0, -50]));
        let updates = Rc::new(Cell::new(0));
        let counter = updates.clone();
        let mut imu = accelerometer_with(bytes).on_update(move |_| counter.set(counter.get() + 1));
        imu.initialize(&["main".to_string()]).unwrap();

        // Two garbage bytes, then the frame
        assert_eq!(imu.read().unwrap(), Reading::Motion(MotionRecord::default()));
        assert_eq!(imu.read().unwrap(), Reading::Motion(MotionRecord::default()));
        assert_eq!(updates.get(), 0);

        let reading = imu.read().unwrap();
        assert_eq!(updates.get(), 1);
        let record = reading.as_motion().unwrap();
        assert!((record.yaw - 5.0).abs() < 1e-5);

        // Stream drained: the last record is repeated, handler stays quiet
        assert_eq!(imu.read().unwrap(), reading);
        assert_eq!(updates.get(), 1);
        assert_eq!(imu.stats().frames, 1);
        assert_eq!(imu.stats().skipped, 2);
    }

    #[test]
    fn test_poll_reports_only_fresh_records() {
        let mut imu = accelerometer_with(encode_frame([0, 0, 0, 0, 0, 1000]).to_vec());
        imu.initialize(&[]).unwrap();
        assert!(imu.poll().unwrap().is_some());
        assert!(imu.poll().unwrap().is_none());
        assert!((imu.latest().z_accel - 9.8067).abs() < 1e-4);
    }

    #[test]
    fn test_closed_accelerometer_rejects_reads() {
        let mut imu = accelerometer_with(Vec::new());
        imu.initialize(&[]).unwrap();
        imu.close().unwrap();
        assert_eq!(imu.state(), DeviceState::Closed);
        assert!(matches!(imu.read(), Err(DeviceError::DeviceClosed(_))));
    }
}
