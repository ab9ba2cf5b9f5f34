// Byte stream capability the frame decoder pulls from
//
// `SerialStream` keeps a local read-ahead buffer so the decoder can peek and
// check how many bytes are waiting without consuming any of them.

use serialport::{self, SerialPort};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::Duration;
use tracing::{debug, info};

use super::rvc::FRAME_LEN;
use crate::config::{IMU_BAUDRATE, SERIAL_TIMEOUT_MS};

/// Largest chunk pulled from the port per read
const READ_CHUNK: usize = 256;

/// Read-ahead bound: four frames, so a slow consumer lags by at most that
pub const READ_AHEAD_LIMIT: usize = 4 * FRAME_LEN;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream has {available} bytes, {wanted} requested")]
    Exhausted { wanted: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, StreamError>;

pub trait ByteStream {
    /// Bytes that can be consumed right now
    fn available(&mut self) -> Result<usize>;

    /// Next byte without consuming it
    fn peek_byte(&mut self) -> Result<u8>;

    fn read_byte(&mut self) -> Result<u8>;

    /// Fill `buf` completely; callers check `available()` first
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;
}

fn take_front(buffer: &mut VecDeque<u8>, out: &mut [u8]) -> Result<()> {
    if buffer.len() < out.len() {
        return Err(StreamError::Exhausted {
            wanted: out.len(),
            available: buffer.len(),
        });
    }
    let n = out.len();
    for (dst, src) in out.iter_mut().zip(buffer.drain(..n)) {
        *dst = src;
    }
    Ok(())
}

/// In-memory stream, used for replay and tests
impl ByteStream for VecDeque<u8> {
    fn available(&mut self) -> Result<usize> {
        Ok(self.len())
    }

    fn peek_byte(&mut self) -> Result<u8> {
        self.front().copied().ok_or(StreamError::Exhausted {
            wanted: 1,
            available: 0,
        })
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.pop_front().ok_or(StreamError::Exhausted {
            wanted: 1,
            available: 0,
        })
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        take_front(self, buf)
    }
}

/// Port the read-ahead buffer drains
pub trait PortSource: Read {
    /// Bytes the driver already holds
    fn pending(&mut self) -> Result<usize>;
}

impl PortSource for Box<dyn SerialPort> {
    fn pending(&mut self) -> Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }
}

/// Serial link to the IMU.
///
/// The read-ahead buffer keeps at most `READ_AHEAD_LIMIT` bytes. When the
/// sensor outpaces the consumer the oldest bytes are dropped and the decoder
/// resyncs on the newest frames.
pub struct SerialStream<P: PortSource = Box<dyn SerialPort>> {
    port: P,
    buffer: VecDeque<u8>,
    dropped: u64,
}

impl SerialStream {
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, IMU_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
            .open()?;
        info!("Opened IMU stream on {} at {} baud", port_name, baudrate);

        Ok(Self::from_port(port))
    }
}

impl<P: PortSource> SerialStream<P> {
    pub fn from_port(port: P) -> Self {
        Self {
            port,
            buffer: VecDeque::with_capacity(READ_AHEAD_LIMIT + READ_CHUNK),
            dropped: 0,
        }
    }

    /// Bytes discarded so far because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Move whatever the driver already holds into the local buffer
    fn fill(&mut self) -> Result<()> {
        let mut pending = self.port.pending()?;
        let mut chunk = [0u8; READ_CHUNK];
        while pending > 0 {
            let wanted = pending.min(READ_CHUNK);
            let n = match self.port.read(&mut chunk[..wanted]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::TimedOut => 0,
                Err(e) => return Err(StreamError::Io(e)),
            };
            if n == 0 {
                break;
            }
            self.buffer.extend(&chunk[..n]);
            pending -= n.min(pending);
            self.trim();
        }
        Ok(())
    }

    /// Drop the oldest bytes beyond the read-ahead limit
    fn trim(&mut self) {
        let excess = self.buffer.len().saturating_sub(READ_AHEAD_LIMIT);
        if excess > 0 {
            self.buffer.drain(..excess);
            self.dropped += excess as u64;
            debug!("IMU read-ahead full, dropped {} stale bytes", excess);
        }
    }
}

impl<P: PortSource> ByteStream for SerialStream<P> {
    fn available(&mut self) -> Result<usize> {
        self.fill()?;
        Ok(self.buffer.len())
    }

    fn peek_byte(&mut self) -> Result<u8> {
        if self.buffer.is_empty() {
            self.fill()?;
        }
        self.buffer.peek_byte()
    }

    fn read_byte(&mut self) -> Result<u8> {
        if self.buffer.is_empty() {
            self.fill()?;
        }
        self.buffer.read_byte()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.buffer.len() < buf.len() {
            self.fill()?;
        }
        take_front(&mut self.buffer, buf)
    }
}
