//! Byte transport abstraction for the BUSSide programmer link.
//!
//! The link needs exactly four things from the wire below it:
//! - a blocking write
//! - a read that gives up after a wall-clock timeout
//! - a way to drop whatever is sitting in the receive buffer
//! - a way to release the device
//!
//! This is the lowest layer. [`SerialTransport`] talks to a real port;
//! [`MemoryTransport`] plays the device side in tests.

pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use serial::{SerialTransport, DEFAULT_BAUD_RATE, MAX_READ_WAIT};
pub use traits::Transport;
