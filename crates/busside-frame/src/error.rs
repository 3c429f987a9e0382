use std::time::Duration;

use busside_transport::TransportError;

/// Errors that can occur while encoding, sending or receiving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the 32-bit length field.
    #[error("payload too large ({size} bytes)")]
    PayloadTooLarge { size: usize },

    /// A frame buffer could not be allocated.
    #[error("failed to allocate {size}-byte frame buffer")]
    Allocation { size: usize },

    /// Fewer bytes arrived than the frame needs.
    #[error("truncated frame (expected {expected} bytes, got {actual})")]
    Truncated { expected: usize, actual: usize },

    /// The declared payload length is not what the request calls for.
    #[error("payload length mismatch (declared {declared}, expected {expected})")]
    LengthMismatch { declared: u32, expected: u32 },

    /// The reply answers a different request.
    #[error("sequence mismatch (expected {expected}, got {actual})")]
    SequenceMismatch { expected: u32, actual: u32 },

    /// The transmitted CRC does not match the frame contents.
    #[error("checksum mismatch (transmitted {transmitted:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { transmitted: u32, computed: u32 },

    /// No reply marker was seen within the budget.
    #[error("no frame marker within {0:?}")]
    SyncTimeout(Duration),

    /// The transport below failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// True when the failure is "nothing (or not enough) arrived in time",
    /// as opposed to something arriving that was wrong.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::SyncTimeout(_) | Self::Truncated { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
