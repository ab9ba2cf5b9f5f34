// Error types for the device tree and its containers

use std::collections::TryReserveError;

use crate::device::DeviceState;
use crate::imu::stream::StreamError;

/// Errors raised by devices, controllers and the sequence container.
///
/// Wire-level decode problems never show up here; the frame decoder absorbs
/// them and reports them as a `DecodeOutcome` instead.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("`{device}` only takes in {required} pins, got {actual}")]
    InvalidConfiguration {
        device: String,
        required: usize,
        actual: usize,
    },

    #[error("Tag \"{0}\" is already attached")]
    DuplicateTag(String),

    #[error("Pin {pin} of `{tag}` is already claimed by `{holder}`")]
    PinConflict {
        pin: u16,
        tag: String,
        holder: String,
    },

    #[error("No device tagged \"{0}\"")]
    NotFound(String),

    #[error("Index {index} out of range for length {size}")]
    OutOfRange { index: usize, size: usize },

    #[error("Illegal capacity: {0}")]
    InvalidCapacity(isize),

    #[error("Cannot {operation} `{tag}` while {state:?}")]
    InvalidState {
        tag: String,
        state: DeviceState,
        operation: &'static str,
    },

    #[error("Device `{0}` is closed")]
    DeviceClosed(String),

    #[error("Device `{tag}` does not support {operation}")]
    Unsupported {
        tag: String,
        operation: &'static str,
    },

    #[error("Allocation failed: {0}")]
    AllocationFailed(#[from] TryReserveError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
