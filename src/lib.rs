// Data-acquisition layer for the vehicle instrumentation board
//
// Sensors are organized in a tag-addressed device tree; the IMU is read
// through a resynchronizing frame decoder over its serial byte stream.

pub mod config;
pub mod device;
pub mod error;
pub mod hal;
pub mod imu;
pub mod messages;
pub mod runtime;
pub mod sensors;
pub mod sequence;

pub use device::{Controller, DeviceState, Sensor};
pub use error::{DeviceError, Result};
pub use messages::{MotionRecord, Reading};
pub use sequence::Sequence;
