use std::time::Duration;

use bytes::{BufMut, Bytes};

use crate::checksum::Crc32;
use crate::error::{FrameError, Result};

/// Frame header: command (4) + payload length (4) + sequence (4) + checksum (4).
pub const HEADER_SIZE: usize = 16;

/// Marker sent ahead of every frame: 0xFE 0xCA.
pub const MARKER: [u8; 2] = [0xFE, 0xCA];

const SEQUENCE_OFFSET: usize = 8;
const CHECKSUM_OFFSET: usize = 12;

/// Parsed fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Request type.
    pub command: u32,
    /// Number of payload bytes following the header.
    pub payload_length: u32,
    /// Binds a reply to its request.
    pub sequence_number: u32,
    /// CRC-32 over the frame with this field zeroed.
    pub checksum: u32,
}

/// A validated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Request type.
    pub command: u32,
    /// Sequence number carried by the frame.
    pub sequence_number: u32,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(command: u32, sequence_number: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            sequence_number,
            payload: payload.into(),
        }
    }

    /// The total size of this frame without the marker (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format (without the marker).
///
/// Wire format:
/// ```text
/// ┌───────────┬─────────────┬───────────┬───────────┬──────────────────┐
/// │ Command   │ Payload len │ Sequence  │ CRC-32    │ Payload          │
/// │ (4B LE)   │ (4B LE)     │ (4B LE)   │ (4B LE)   │ (Payload len B)  │
/// └───────────┴─────────────┴───────────┴───────────┴──────────────────┘
/// ```
pub fn encode_frame<B: BufMut>(
    command: u32,
    sequence_number: u32,
    payload: &[u8],
    dst: &mut B,
) -> Result<()> {
    let payload_length = payload_length(payload)?;
    let mut header = [0u8; HEADER_SIZE];
    write_header(
        &mut header,
        &FrameHeader {
            command,
            payload_length,
            sequence_number,
            checksum: 0,
        },
    );
    let checksum = Crc32::new().update(&header).update(payload).finish();
    header[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_le_bytes());

    dst.put_slice(&header);
    dst.put_slice(payload);
    Ok(())
}

/// Parse the fixed-size header at the start of `src`.
///
/// Only the header is looked at; the payload still has to be read and the
/// checksum verified before the frame can be trusted.
pub fn decode_header(src: &[u8]) -> Result<FrameHeader> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            expected: HEADER_SIZE,
            actual: src.len(),
        });
    }
    Ok(FrameHeader {
        command: read_u32(src, 0),
        payload_length: read_u32(src, 4),
        sequence_number: read_u32(src, SEQUENCE_OFFSET),
        checksum: read_u32(src, CHECKSUM_OFFSET),
    })
}

/// CRC-32 of a complete frame (header + payload) with the checksum field
/// treated as zero.
pub fn frame_checksum(frame: &[u8]) -> u32 {
    let header_end = frame.len().min(HEADER_SIZE);
    let mut crc = Crc32::new();
    crc.update(&frame[..CHECKSUM_OFFSET.min(header_end)]);
    if header_end > CHECKSUM_OFFSET {
        crc.update(&[0u8; 4][..header_end - CHECKSUM_OFFSET]);
    }
    crc.update(&frame[header_end..]);
    crc.finish()
}

/// Check the embedded CRC of a complete frame (header + payload).
pub fn verify(frame: &[u8]) -> bool {
    match decode_header(frame) {
        Ok(header) => frame_checksum(frame) == header.checksum,
        Err(_) => false,
    }
}

/// Decode and validate a complete frame (header + payload, no marker).
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    let header = decode_header(src)?;
    let actual = src.len() - HEADER_SIZE;
    if header.payload_length as usize != actual {
        return Err(FrameError::LengthMismatch {
            declared: header.payload_length,
            expected: actual as u32,
        });
    }

    let computed = frame_checksum(src);
    if computed != header.checksum {
        return Err(FrameError::ChecksumMismatch {
            transmitted: header.checksum,
            computed,
        });
    }

    Ok(Frame {
        command: header.command,
        sequence_number: header.sequence_number,
        payload: Bytes::copy_from_slice(&src[HEADER_SIZE..]),
    })
}

/// An outgoing frame, marker included, ready to be written.
///
/// Built once per logical request. Each retry only re-stamps the sequence
/// number and checksum in place.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    wire: Vec<u8>,
}

impl EncodedFrame {
    /// Build the wire buffer for `command` carrying `payload`.
    pub fn encode(command: u32, sequence_number: u32, payload: &[u8]) -> Result<Self> {
        payload_length(payload)?;
        let size = MARKER.len() + HEADER_SIZE + payload.len();
        let mut wire = Vec::new();
        wire.try_reserve_exact(size)
            .map_err(|_| FrameError::Allocation { size })?;
        wire.put_slice(&MARKER);
        encode_frame(command, sequence_number, payload, &mut wire)?;
        Ok(Self { wire })
    }

    /// Replace the sequence number and recompute the checksum.
    pub fn restamp(&mut self, sequence_number: u32) {
        let frame = &mut self.wire[MARKER.len()..];
        frame[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4].copy_from_slice(&sequence_number.to_le_bytes());
        let checksum = frame_checksum(frame);
        frame[CHECKSUM_OFFSET..HEADER_SIZE].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Marker + header + payload.
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    /// Header + payload, without the marker.
    pub fn frame_bytes(&self) -> &[u8] {
        &self.wire[MARKER.len()..]
    }

    /// The current header.
    pub fn header(&self) -> FrameHeader {
        let frame = self.frame_bytes();
        FrameHeader {
            command: read_u32(frame, 0),
            payload_length: read_u32(frame, 4),
            sequence_number: read_u32(frame, SEQUENCE_OFFSET),
            checksum: read_u32(frame, CHECKSUM_OFFSET),
        }
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.wire[MARKER.len() + HEADER_SIZE..]
    }
}

impl std::fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedFrame")
            .field("header", &self.header())
            .field("wire_len", &self.wire.len())
            .finish()
    }
}

/// Timing for one request/reply exchange.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// How long to hunt for the reply marker. Default: 3 s.
    pub sync_timeout: Duration,
    /// Sub-timeout for each single-byte read while hunting. Default: 1 s.
    pub sync_poll_interval: Duration,
    /// Budget for reading the header, and again for the payload. Default: 2 s.
    pub read_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_secs(3),
            sync_poll_interval: Duration::from_secs(1),
            read_timeout: Duration::from_millis(2000),
        }
    }
}

fn payload_length(payload: &[u8]) -> Result<u32> {
    u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
    })
}

fn write_header(dst: &mut [u8; HEADER_SIZE], header: &FrameHeader) {
    dst[0..4].copy_from_slice(&header.command.to_le_bytes());
    dst[4..8].copy_from_slice(&header.payload_length.to_le_bytes());
    dst[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4]
        .copy_from_slice(&header.sequence_number.to_le_bytes());
    dst[CHECKSUM_OFFSET..HEADER_SIZE].copy_from_slice(&header.checksum.to_le_bytes());
}

fn read_u32(src: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&src[offset..offset + 4]);
    u32::from_le_bytes(word)
}
