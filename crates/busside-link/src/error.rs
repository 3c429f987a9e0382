use busside_frame::FrameError;
use busside_transport::TransportError;

/// Errors surfaced by the link and the programmer interface.
///
/// Per-attempt failures (timeouts, bad replies) never show up here on their
/// own; the retry loop absorbs them and reports [`LinkError::RetriesExhausted`]
/// once the attempt budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error outside an exchange (open, shutdown).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error while building a request.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// A frame buffer could not be allocated.
    #[error("failed to allocate {size}-byte frame buffer")]
    AllocationFailure { size: usize },

    /// No valid reply within the attempt budget; the command did not run.
    #[error("no valid reply after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The sequence store could not be read or written.
    #[error("sequence store unavailable: {0}")]
    StoreUnavailable(#[source] std::io::Error),

    /// The 32-bit sequence space is used up.
    #[error("sequence numbers exhausted")]
    SequenceExhausted,

    /// A transfer exceeds what the programmer accepts in one command.
    #[error("{direction} of {size} bytes exceeds programmer limit of {max}")]
    TransferTooLarge {
        direction: &'static str,
        size: usize,
        max: usize,
    },

    /// SPI commands were issued before the probe handshake succeeded.
    #[error("programmer not initialized")]
    NotInitialized,

    /// The SPI speed name is not in the programmer's table.
    #[error("unknown SPI speed '{0}'")]
    UnknownSpeed(String),
}

impl From<FrameError> for LinkError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Allocation { size } => LinkError::AllocationFailure { size },
            FrameError::Transport(err) => LinkError::Transport(err),
            other => LinkError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
