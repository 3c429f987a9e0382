//! Reliable request/reply link to the BUSSide programmer.
//!
//! This is the layer hosts talk to. It stamps every request with a persisted,
//! never-reused sequence number, retries lost or garbled exchanges a bounded
//! number of times, and exposes the programmer as an SPI master.

pub mod command;
pub mod connector;
pub mod error;
pub mod link;
pub mod programmer;
pub mod sequence;

pub use command::{Request, SpiCommand, SpiSpeed, SPI_ARGUMENT_WORDS, SPI_PIN_CONFIG};
pub use connector::{connect, connect_with_config, ConnectConfig, SerialProgrammer};
pub use error::{LinkError, Result};
pub use link::{AttemptFailure, Link, LinkConfig};
pub use programmer::{
    Programmer, ProgrammerConfig, DEFAULT_ATTEMPTS, MAX_DATA_READ, MAX_DATA_WRITE,
};
pub use sequence::{
    FileSequenceStore, MemorySequenceStore, SequenceCounter, SequenceStore,
    DEFAULT_SEQUENCE_PATH, INITIAL_SEQUENCE,
};
