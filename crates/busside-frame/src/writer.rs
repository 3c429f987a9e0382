use busside_transport::Transport;
use tracing::trace;

use crate::codec::EncodedFrame;
use crate::command::command_name;
use crate::error::Result;

/// Write marker + frame in one go.
pub fn send_frame<T: Transport + ?Sized>(transport: &mut T, frame: &EncodedFrame) -> Result<()> {
    let header = frame.header();
    transport.send(frame.wire())?;
    trace!(
        command = command_name(header.command),
        sequence = header.sequence_number,
        payload_len = header.payload_length,
        "frame sent"
    );
    Ok(())
}
