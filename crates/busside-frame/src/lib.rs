//! Checksummed request/reply framing for the BUSSide link.
//!
//! Every request and reply travels as:
//! - the 2-byte marker `FE CA`, which is how a reply is found in a noisy stream
//! - a 16-byte header of four little-endian `u32`s: command, payload length,
//!   sequence number, CRC-32
//! - `payload_length` payload bytes
//!
//! The CRC covers header and payload with its own field zeroed.

pub mod checksum;
pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod sync;
pub mod writer;

pub use checksum::{checksum, Crc32};
pub use codec::{
    decode_frame, decode_header, encode_frame, frame_checksum, verify, EncodedFrame, Frame,
    FrameConfig, FrameHeader, HEADER_SIZE, MARKER,
};
pub use command::{command_name, PROBE, SPI_PASSTHROUGH};
pub use error::{FrameError, Result};
pub use reader::{read_reply, ReplyExpectation};
pub use sync::await_marker;
pub use writer::send_frame;
