//! Frame encoding/decoding utilities.
//!
//! Every frame starts with the [`START_BYTE`] sentinel, followed by the
//! command, a 2-byte little-endian payload length, the payload and a 1-byte
//! XOR checksum of the payload.
//!
//! ```text
//! +------+-----+--------+--------+-------------------+----------+
//! | 0xAA | cmd | len_lo | len_hi | payload[0..len]   | checksum |
//! +------+-----+--------+--------+-------------------+----------+
//! ```

use anvil_metrics::metric_defs;
use bytes::{Buf, BufMut, BytesMut};
use log::{error, trace};

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{Command, Frame};

/// XOR of every payload byte. The empty payload checksums to zero.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a command and payload into wire bytes.
pub fn encode_frame(command: Command, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            max: MAX_PAYLOAD_SIZE,
            actual: payload.len(),
        });
    }
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    buf.put_u8(START_BYTE);
    buf.put_u8(command.into());
    buf.put_u16_le(payload.len() as u16);
    buf.put_slice(payload);
    buf.put_u8(checksum(payload));
    Ok(buf)
}

/// Counters kept by a [`FrameCodec`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecStats {
    /// Frames that passed the checksum.
    pub frames_decoded: u64,
    /// Frames discarded on checksum mismatch.
    pub checksum_errors: u64,
    /// Bytes dropped while searching for a start byte.
    pub resync_bytes: u64,
}

/// Incremental frame decoder.
///
/// Bytes may arrive in any chunking; [`FrameCodec::decode`] yields a frame as
/// soon as the whole of it is buffered.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    stats: CodecStats,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        FrameCodec {
            buffer: BytesMut::with_capacity(DEFAULT_READ_CHUNK),
            stats: CodecStats::default(),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer.
    ///
    /// Returns `None` when more data is needed, `Some(Ok(frame))` for a valid
    /// frame, and `Some(Err(ChecksumMismatch))` when a complete frame failed its
    /// checksum. A rejected frame is removed from the buffer in full.
    pub fn decode(&mut self) -> Option<ProtocolResult<Frame>> {
        // Drop anything ahead of the sentinel
        let skipped = self
            .buffer
            .iter()
            .position(|&b| b == START_BYTE)
            .unwrap_or(self.buffer.len());
        if skipped > 0 {
            self.buffer.advance(skipped);
            self.stats.resync_bytes += skipped as u64;
            metrics::counter!(metric_defs::CODEC_RESYNC_BYTES.name).increment(skipped as u64);
            trace!("FrameCodec: resync dropped {} bytes", skipped);
        }

        if self.buffer.len() < HEADER_SIZE {
            return None;
        }

        let len = u16::from_le_bytes([self.buffer[2], self.buffer[3]]) as usize;
        let total = HEADER_SIZE + len + CHECKSUM_SIZE;
        if self.buffer.len() < total {
            return None;
        }

        let mut raw = self.buffer.split_to(total);
        raw.advance(1);
        let command = Command::from(raw.get_u8());
        raw.advance(2);
        let payload = raw.split_to(len).to_vec();
        let actual = raw.get_u8();
        let expected = checksum(&payload);

        if expected != actual {
            self.stats.checksum_errors += 1;
            metrics::counter!(metric_defs::CODEC_CHECKSUM_ERRORS.name).increment(1);
            error!(
                "FrameCodec: checksum mismatch for {}: computed 0x{:02X}, received 0x{:02X}",
                command, expected, actual
            );
            return Some(Err(ProtocolError::ChecksumMismatch {
                command,
                expected,
                actual,
            }));
        }

        self.stats.frames_decoded += 1;
        metrics::counter!(metric_defs::CODEC_FRAMES_DECODED.name).increment(1);
        Some(Ok(Frame { command, payload }))
    }

    /// Decode every complete frame currently buffered.
    pub fn decode_all(&mut self) -> Vec<ProtocolResult<Frame>> {
        std::iter::from_fn(|| self.decode()).collect()
    }

    /// Encode a frame for transmission.
    pub fn encode(command: Command, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        encode_frame(command, payload)
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes still buffered, waiting for the rest of a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Counters since creation.
    pub fn stats(&self) -> CodecStats {
        self.stats
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Decode every complete frame in `data`.
///
/// Returns the outcomes plus the unconsumed tail, which should be prepended to
/// the next delivery.
pub fn decode_frames(data: &[u8]) -> (Vec<ProtocolResult<Frame>>, Vec<u8>) {
    let mut codec = FrameCodec::new();
    codec.push(data);
    let outcomes = codec.decode_all();
    (outcomes, codec.buffered().to_vec())
}
