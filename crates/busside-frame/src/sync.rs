use std::time::{Duration, Instant};

use busside_transport::Transport;
use tracing::trace;

use crate::codec::MARKER;
use crate::error::{FrameError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Searching,
    GotFirst,
}

/// Consume bytes from `transport` until the frame marker `FE CA` has been read.
///
/// Reads one byte at a time, each read bounded by `poll_interval` (clamped to
/// what is left of `timeout`). Runs of `FE` keep the candidate alive, so
/// `FE FE CA` still synchronizes; any other byte, or a sub-read that comes back
/// empty, drops back to searching. On success the stream is positioned
/// immediately after the `CA`.
pub fn await_marker<T: Transport + ?Sized>(
    transport: &mut T,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start = Instant::now();
    let mut state = SyncState::Searching;
    let mut skipped = 0usize;

    loop {
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            trace!(skipped, "marker not found");
            return Err(FrameError::SyncTimeout(timeout));
        }

        let wait = poll_interval.min(timeout - elapsed);
        let mut byte = [0u8; 1];
        if transport.recv(&mut byte, wait)? != 1 {
            state = SyncState::Searching;
            continue;
        }

        state = match (state, byte[0]) {
            (SyncState::GotFirst, b) if b == MARKER[1] => {
                trace!(skipped, "marker found");
                return Ok(());
            }
            (_, b) if b == MARKER[0] => SyncState::GotFirst,
            (SyncState::GotFirst, _) => {
                skipped += 2;
                SyncState::Searching
            }
            (SyncState::Searching, _) => {
                skipped += 1;
                SyncState::Searching
            }
        };
    }
}
