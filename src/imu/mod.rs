// IMU support for the BNO08x in UART-RVC mode
//
// Provides:
// - Byte stream capability and a serial-port implementation
// - Resynchronizing 19-byte frame decoder
// - Accelerometer device for the device tree

mod accelerometer;
pub mod rvc;
pub mod stream;

pub use accelerometer::Accelerometer;
pub use rvc::{DecodeOutcome, DecoderStats, FrameFault, RvcDecoder};
pub use stream::{ByteStream, PortSource, READ_AHEAD_LIMIT, SerialStream, StreamError};
