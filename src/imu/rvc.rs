// UART-RVC frame decoder for the BNO08x IMU
//
// Frame format (19 bytes):
// [0xAA, 0xAA, yaw_lo, yaw_hi, pitch_lo, pitch_hi, roll_lo, roll_hi,
//  x_lo, x_hi, y_lo, y_hi, z_lo, z_hi, 4 reserved bytes, checksum]
//
// Checksum is the 8-bit truncated sum of the 16 payload bytes.

use serde::Serialize;
use tracing::{debug, warn};

use super::stream::{ByteStream, StreamError};
use crate::messages::MotionRecord;

/// Frame synchronization byte (appears twice)
pub const SYNC_BYTE: u8 = 0xAA;

/// Full frame length: 2 sync + 16 payload + 1 checksum
pub const FRAME_LEN: usize = 19;
const PAYLOAD_LEN: usize = 16;

/// Why a synchronized frame was thrown away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFault {
    MissingSecondSync { found: u8 },
    ChecksumMismatch { expected: u8, received: u8 },
}

/// Result of one decoder poll. None of these stop the polling loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeOutcome {
    /// No bytes waiting (or the stream could not be read)
    Empty,
    /// A non-sync byte was discarded while searching for a frame start
    Skipped(u8),
    /// Sync found but the full frame has not arrived; nothing consumed
    Incomplete { available: usize },
    Corrupt(FrameFault),
    Record(MotionRecord),
}

impl DecodeOutcome {
    pub fn record(self) -> Option<MotionRecord> {
        match self {
            DecodeOutcome::Record(record) => Some(record),
            _ => None,
        }
    }
}

/// Running counters for link diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    pub frames: u64,
    pub corrupt: u64,
    pub skipped: u64,
}

/// Calculate the frame checksum over the payload bytes
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Build a wire frame from raw values [yaw, pitch, roll, x, y, z]
pub fn encode_frame(raw: [i16; 6]) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = SYNC_BYTE;
    frame[1] = SYNC_BYTE;
    for (i, value) in raw.iter().enumerate() {
        let [lo, hi] = value.to_le_bytes();
        frame[2 + 2 * i] = lo;
        frame[3 + 2 * i] = hi;
    }
    frame[FRAME_LEN - 1] = checksum(&frame[2..2 + PAYLOAD_LEN]);
    frame
}

/// Decode the six little-endian signed fields of a payload
fn decode_payload(payload: &[u8; PAYLOAD_LEN]) -> MotionRecord {
    let mut raw = [0i16; 6];
    for (i, value) in raw.iter_mut().enumerate() {
        *value = i16::from_le_bytes([payload[2 * i], payload[2 * i + 1]]);
    }
    MotionRecord::from_raw(raw)
}

/// Non-blocking, resynchronizing frame decoder.
///
/// Each `poll` does a bounded amount of work and yields at most one record.
#[derive(Debug, Default)]
pub struct RvcDecoder {
    stats: DecoderStats,
}

impl RvcDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Try to decode one frame from the stream
    pub fn poll<S: ByteStream + ?Sized>(&mut self, stream: &mut S) -> DecodeOutcome {
        match self.try_poll(stream) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("IMU stream unavailable: {}", e);
                DecodeOutcome::Empty
            }
        }
    }

    fn try_poll<S: ByteStream + ?Sized>(
        &mut self,
        stream: &mut S,
    ) -> Result<DecodeOutcome, StreamError> {
        let available = stream.available()?;
        if available == 0 {
            return Ok(DecodeOutcome::Empty);
        }

        // Resync: drop one byte per call until a frame start shows up
        if stream.peek_byte()? != SYNC_BYTE {
            let byte = stream.read_byte()?;
            self.stats.skipped += 1;
            return Ok(DecodeOutcome::Skipped(byte));
        }

        // Never consume a partial frame
        if available < FRAME_LEN {
            return Ok(DecodeOutcome::Incomplete { available });
        }

        stream.read_byte()?;
        let second = stream.read_byte()?;
        if second != SYNC_BYTE {
            self.stats.corrupt += 1;
            debug!("IMU frame missing second sync byte: 0x{:02X}", second);
            return Ok(DecodeOutcome::Corrupt(FrameFault::MissingSecondSync {
                found: second,
            }));
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        stream.read_bytes(&mut payload)?;
        let received = stream.read_byte()?;
        let expected = checksum(&payload);
        if expected != received {
            self.stats.corrupt += 1;
            debug!(
                "IMU checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
                expected, received
            );
            return Ok(DecodeOutcome::Corrupt(FrameFault::ChecksumMismatch {
                expected,
                received,
            }));
        }

        self.stats.frames += 1;
        Ok(DecodeOutcome::Record(decode_payload(&payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const SAMPLE: [i16; 6] = [500, -200, 0, 100, 0, -50];

    fn close_to(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn stream_of(bytes: &[u8]) -> VecDeque<u8> {
        bytes.iter().copied().collect()
    }

    #[test]
    fn test_checksum_truncates() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_sample_frame_layout() {
        let frame = encode_frame(SAMPLE);
        assert_eq!(&frame[..2], &[0xAA, 0xAA]);
        // yaw = 500 = 0x01F4, little-endian
        assert_eq!(&frame[2..4], &[0xF4, 0x01]);
        // pitch = -200 = 0xFF38
        assert_eq!(&frame[4..6], &[0x38, 0xFF]);
        assert_eq!(frame[18], checksum(&frame[2..18]));
    }

    #[test]
    fn test_decode_well_formed_frame() {
        let mut stream = stream_of(&encode_frame(SAMPLE));
        let mut decoder = RvcDecoder::new();

        let record = decoder.poll(&mut stream).record().expect("frame should decode");
        assert!(close_to(record.yaw, 5.0));
        assert!(close_to(record.pitch, -2.0));
        assert!(close_to(record.roll, 0.0));
        assert!(close_to(record.x_accel, 0.98067));
        assert!(close_to(record.y_accel, 0.0));
        assert!(close_to(record.z_accel, -0.490335));

        assert!(stream.is_empty());
        assert_eq!(decoder.poll(&mut stream), DecodeOutcome::Empty);
        assert_eq!(decoder.stats().frames, 1);
    }

    #[test]
    fn test_garbage_discarded_one_byte_per_call() {
        let garbage = [0x01, 0x55, 0xFE];
        let mut bytes = garbage.to_vec();
        bytes.extend_from_slice(&encode_frame(SAMPLE));
        let mut stream = stream_of(&bytes);
        let mut decoder = RvcDecoder::new();

        for &byte in &garbage {
            assert_eq!(decoder.poll(&mut stream), DecodeOutcome::Skipped(byte));
        }
        let record = decoder.poll(&mut stream).record().unwrap();
        assert!(close_to(record.yaw, 5.0));
        assert_eq!(decoder.stats().skipped, 3);
    }

    #[test]
    fn test_bad_checksum_reported_as_corrupt() {
        let mut frame = encode_frame(SAMPLE);
        frame[18] = frame[18].wrapping_add(1);
        let mut stream = stream_of(&frame);
        let mut decoder = RvcDecoder::new();

        assert!(matches!(
            decoder.poll(&mut stream),
            DecodeOutcome::Corrupt(FrameFault::ChecksumMismatch { .. })
        ));
        assert!(stream.is_empty());
        assert_eq!(decoder.stats().corrupt, 1);
        assert_eq!(decoder.stats().frames, 0);
    }

    #[test]
    fn test_partial_frame_not_consumed() {
        let frame = encode_frame(SAMPLE);
        let mut stream = stream_of(&frame[..18]);
        let mut decoder = RvcDecoder::new();

        assert_eq!(
            decoder.poll(&mut stream),
            DecodeOutcome::Incomplete { available: 18 }
        );
        assert_eq!(stream.len(), 18);

        stream.push_back(frame[18]);
        let record = decoder.poll(&mut stream).record().unwrap();
        assert!(close_to(record.z_accel, -0.490335));
    }

    #[test]
    fn test_missing_second_sync_consumes_two_bytes() {
        let frame = encode_frame(SAMPLE);
        let mut bytes = vec![0xAA, 0x00];
        bytes.extend_from_slice(&frame[2..]);
        bytes.extend_from_slice(&frame);
        let mut stream = stream_of(&bytes);
        let total = stream.len();
        let mut decoder = RvcDecoder::new();

        assert_eq!(
            decoder.poll(&mut stream),
            DecodeOutcome::Corrupt(FrameFault::MissingSecondSync { found: 0x00 })
        );
        assert_eq!(stream.len(), total - 2);

        // Resync through the orphaned payload, then decode the good frame
        let mut record = None;
        for _ in 0..64 {
            if let Some(r) = decoder.poll(&mut stream).record() {
                record = Some(r);
                break;
            }
        }
        assert!(close_to(record.expect("should resync").pitch, -2.0));
    }

    #[test]
    fn test_one_record_per_poll() {
        let mut bytes = encode_frame(SAMPLE).to_vec();
        bytes.extend_from_slice(&encode_frame([0, 0, 0, 0, 0, 1000]));
        let mut stream = stream_of(&bytes);
        let mut decoder = RvcDecoder::new();

        let first = decoder.poll(&mut stream).record().unwrap();
        assert_eq!(stream.len(), FRAME_LEN);
        let second = decoder.poll(&mut stream).record().unwrap();
        assert!(close_to(first.yaw, 5.0));
        assert!(close_to(second.z_accel, 9.8067));
    }
}
