// Concrete sensors for the instrumentation board
//
// Provides:
// - Debounced wheel speed from a pulse line
// - Pedal travel from an analog line
// - Odometer accumulating written distance

mod odometer;
mod pedal;
mod wheel_speed;

pub use odometer::Odometer;
pub use pedal::Pedal;
pub use wheel_speed::{Debounce, WheelSpeedSensor};
