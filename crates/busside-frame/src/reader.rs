use std::time::Duration;

use busside_transport::Transport;
use bytes::Bytes;
use tracing::trace;

use crate::codec::{decode_header, frame_checksum, Frame, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// What the reply to an outstanding request must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyExpectation {
    /// Sequence number of the request.
    pub sequence_number: u32,
    /// Exact payload length the request calls for.
    pub payload_length: u32,
}

/// Read and validate one reply frame. The marker must already be consumed.
///
/// Checks run in a fixed order, each relying on the previous one: header
/// read, declared length, payload read, sequence number, checksum. A reply
/// that fails any of them is rejected whole.
pub fn read_reply<T: Transport + ?Sized>(
    transport: &mut T,
    expect: ReplyExpectation,
    read_timeout: Duration,
) -> Result<Frame> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    read_exact(transport, &mut header_bytes, read_timeout)?;
    let header = decode_header(&header_bytes)?;

    if header.payload_length != expect.payload_length {
        return Err(FrameError::LengthMismatch {
            declared: header.payload_length,
            expected: expect.payload_length,
        });
    }

    let size = HEADER_SIZE + header.payload_length as usize;
    let mut frame = Vec::new();
    frame
        .try_reserve_exact(size)
        .map_err(|_| FrameError::Allocation { size })?;
    frame.extend_from_slice(&header_bytes);
    frame.resize(size, 0);
    if header.payload_length > 0 {
        read_exact(transport, &mut frame[HEADER_SIZE..], read_timeout)?;
    }

    if header.sequence_number != expect.sequence_number {
        return Err(FrameError::SequenceMismatch {
            expected: expect.sequence_number,
            actual: header.sequence_number,
        });
    }

    let computed = frame_checksum(&frame);
    if computed != header.checksum {
        return Err(FrameError::ChecksumMismatch {
            transmitted: header.checksum,
            computed,
        });
    }

    trace!(
        sequence = header.sequence_number,
        payload_len = header.payload_length,
        "reply validated"
    );
    Ok(Frame {
        command: header.command,
        sequence_number: header.sequence_number,
        payload: Bytes::from(frame).slice(HEADER_SIZE..),
    })
}

fn read_exact<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<()> {
    let n = transport.recv(buf, timeout)?;
    if n != buf.len() {
        return Err(FrameError::Truncated {
            expected: buf.len(),
            actual: n,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use busside_transport::MemoryTransport;

    use super::*;
    use crate::codec::encode_frame;
    use crate::command::{PROBE, SPI_PASSTHROUGH};

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn transport_with_reply(command: u32, seq: u32, payload: &[u8]) -> MemoryTransport {
        let mut wire = Vec::new();
        encode_frame(command, seq, payload, &mut wire).unwrap();
        let mut transport = MemoryTransport::new();
        transport.push_incoming(&wire);
        transport
    }

    fn expect(seq: u32, len: u32) -> ReplyExpectation {
        ReplyExpectation {
            sequence_number: seq,
            payload_length: len,
        }
    }

    #[test]
    fn reads_empty_reply() {
        let mut transport = transport_with_reply(PROBE, 5, &[]);
        let frame = read_reply(&mut transport, expect(5, 0), TIMEOUT).unwrap();

        assert_eq!(frame.command, PROBE);
        assert_eq!(frame.sequence_number, 5);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn reads_payload_reply() {
        let mut transport = transport_with_reply(SPI_PASSTHROUGH, 9, &[1, 2, 3]);
        let frame = read_reply(&mut transport, expect(9, 3), TIMEOUT).unwrap();
        assert_eq!(frame.payload.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn short_header_is_truncated() {
        let mut transport = MemoryTransport::new();
        transport.push_incoming(&[0u8; 7]);
        let err = read_reply(&mut transport, expect(1, 0), TIMEOUT).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: HEADER_SIZE,
                actual: 7
            }
        ));
        assert!(err.is_timeout());
    }

    #[test]
    fn unexpected_length_rejected_before_payload_read() {
        let mut transport = transport_with_reply(SPI_PASSTHROUGH, 9, &[1, 2, 3, 4]);
        let err = read_reply(&mut transport, expect(9, 3), TIMEOUT).unwrap_err();

        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                declared: 4,
                expected: 3
            }
        ));
        assert_eq!(transport.pending_incoming(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn short_payload_is_truncated() {
        let mut wire = Vec::new();
        encode_frame(SPI_PASSTHROUGH, 3, &[1, 2, 3], &mut wire).unwrap();
        wire.truncate(HEADER_SIZE + 1);
        let mut transport = MemoryTransport::new();
        transport.push_incoming(&wire);

        let err = read_reply(&mut transport, expect(3, 3), TIMEOUT).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { expected: 3, actual: 1 }));
    }

    #[test]
    fn stale_sequence_rejected() {
        let mut transport = transport_with_reply(PROBE, 6, &[]);
        let err = read_reply(&mut transport, expect(5, 0), TIMEOUT).unwrap_err();
        assert!(matches!(
            err,
            FrameError::SequenceMismatch {
                expected: 5,
                actual: 6
            }
        ));
        assert!(!err.is_timeout());
    }

    #[test]
    fn corrupted_payload_rejected() {
        let mut wire = Vec::new();
        encode_frame(SPI_PASSTHROUGH, 4, &[0x10, 0x20], &mut wire).unwrap();
        wire[HEADER_SIZE + 1] ^= 0x80;
        let mut transport = MemoryTransport::new();
        transport.push_incoming(&wire);

        let err = read_reply(&mut transport, expect(4, 2), TIMEOUT).unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
    }
}
