use std::path::PathBuf;

use busside_transport::{SerialTransport, DEFAULT_BAUD_RATE};
use tracing::debug;

use crate::error::Result;
use crate::programmer::{Programmer, ProgrammerConfig};
use crate::sequence::{FileSequenceStore, SequenceCounter, DEFAULT_SEQUENCE_PATH};

/// A programmer on a real serial port with a file-backed counter.
pub type SerialProgrammer = Programmer<SerialTransport, FileSequenceStore>;

/// Everything needed to bring up a programmer on a serial device.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Line rate. Default: 500000.
    pub baud_rate: u32,
    /// Where the sequence counter lives. Default: `/tmp/busside.seq`.
    pub sequence_path: PathBuf,
    /// Programmer settings.
    pub programmer: ProgrammerConfig,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            sequence_path: PathBuf::from(DEFAULT_SEQUENCE_PATH),
            programmer: ProgrammerConfig::default(),
        }
    }
}

/// Connect to a programmer on `device` with default settings.
pub fn connect(device: &str) -> Result<SerialProgrammer> {
    connect_with_config(device, &ConnectConfig::default())
}

/// Open the sequence store, open the port, and run the probe handshake.
///
/// The store is opened first: without it no request may be sent at all.
pub fn connect_with_config(device: &str, config: &ConnectConfig) -> Result<SerialProgrammer> {
    let sequence = SequenceCounter::open(FileSequenceStore::new(&config.sequence_path))?;
    debug!(
        path = %config.sequence_path.display(),
        next = sequence.peek(),
        "sequence counter loaded"
    );

    let transport = SerialTransport::open(device, config.baud_rate)?;
    let mut programmer = Programmer::with_counter(transport, sequence, config.programmer.clone());
    programmer.initialize()?;
    Ok(programmer)
}
