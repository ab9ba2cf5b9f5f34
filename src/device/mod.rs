// Device tree for the instrumentation board
//
// Provides:
// - The `Sensor` capability and the per-device lifecycle (`DeviceCore`)
// - `Controller`, a composite device owning tag-addressed children

mod controller;
mod sensor;

pub use controller::{Controller, DeviceMut, Rejected};
pub use sensor::{DeviceCore, DeviceState, OnUpdate, Pin, Sensor};
