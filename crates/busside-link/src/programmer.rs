use busside_transport::Transport;
use bytes::Bytes;
use tracing::{debug, info};

use crate::command::{Request, SpiCommand, SpiSpeed};
use crate::error::{LinkError, Result};
use crate::link::{Link, LinkConfig};
use crate::sequence::{SequenceCounter, SequenceStore};

/// Attempts per request unless configured otherwise.
pub const DEFAULT_ATTEMPTS: u32 = 10;

/// Largest SPI read the programmer accepts in one command.
pub const MAX_DATA_READ: usize = 2048;

/// Largest SPI write the programmer accepts in one command.
pub const MAX_DATA_WRITE: usize = 2048;

/// Host-side settings for the programmer.
#[derive(Debug, Clone)]
pub struct ProgrammerConfig {
    /// SPI clock for passthrough commands. Default: 8M.
    pub spi_speed: SpiSpeed,
    /// Attempts for the probe handshake. Default: 10.
    pub probe_attempts: u32,
    /// Attempts for each SPI command. Default: 10.
    pub command_attempts: u32,
    /// Per-command read limit. Default: [`MAX_DATA_READ`].
    pub max_read: usize,
    /// Per-command write limit. Default: [`MAX_DATA_WRITE`].
    pub max_write: usize,
    /// Retry loop timing.
    pub link: LinkConfig,
}

impl Default for ProgrammerConfig {
    fn default() -> Self {
        Self {
            spi_speed: SpiSpeed::default(),
            probe_attempts: DEFAULT_ATTEMPTS,
            command_attempts: DEFAULT_ATTEMPTS,
            max_read: MAX_DATA_READ,
            max_write: MAX_DATA_WRITE,
            link: LinkConfig::default(),
        }
    }
}

/// The BUSSide programmer as an SPI master.
///
/// Nothing but the probe is sent until [`initialize`](Self::initialize) has
/// confirmed the device is there and speaking the protocol.
pub struct Programmer<T, S> {
    link: Link<T, S>,
    config: ProgrammerConfig,
    initialized: bool,
}

impl<T: Transport, S: SequenceStore> Programmer<T, S> {
    /// Open the sequence counter on `store` and wrap `transport`.
    pub fn new(transport: T, store: S, config: ProgrammerConfig) -> Result<Self> {
        let sequence = SequenceCounter::open(store)?;
        Ok(Self::with_counter(transport, sequence, config))
    }

    /// Wrap `transport` with an already opened counter.
    pub fn with_counter(
        transport: T,
        sequence: SequenceCounter<S>,
        config: ProgrammerConfig,
    ) -> Self {
        let link = Link::new(transport, sequence, config.link.clone());
        Self {
            link,
            config,
            initialized: false,
        }
    }

    /// Probe handshake. Must succeed before any SPI command is sent.
    pub fn initialize(&mut self) -> Result<()> {
        self.link.exchange(&Request::probe(), self.config.probe_attempts)?;
        self.initialized = true;
        info!(spi_speed = %self.config.spi_speed, "programmer responded to probe");
        Ok(())
    }

    /// Whether the probe handshake has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Write `write`, then read `read_count` bytes, in one SPI transaction.
    ///
    /// Returns exactly `read_count` bytes, or an error if no valid reply
    /// arrived; in that case the transaction must be treated as not executed.
    pub fn execute_spi(&mut self, write: &[u8], read_count: usize) -> Result<Bytes> {
        if !self.initialized {
            return Err(LinkError::NotInitialized);
        }
        if write.len() > self.config.max_write {
            return Err(LinkError::TransferTooLarge {
                direction: "write",
                size: write.len(),
                max: self.config.max_write,
            });
        }
        if read_count > self.config.max_read {
            return Err(LinkError::TransferTooLarge {
                direction: "read",
                size: read_count,
                max: self.config.max_read,
            });
        }

        let request = Request::spi(self.config.spi_speed, write, read_count)?;
        let data = self.link.exchange(&request, self.config.command_attempts)?;
        debug!(write_len = write.len(), read_len = data.len(), "spi command done");
        Ok(data)
    }

    /// Run `commands` in order, stopping at the first failure.
    pub fn execute_multi(&mut self, commands: &[SpiCommand]) -> Result<Vec<Bytes>> {
        commands
            .iter()
            .map(|cmd| self.execute_spi(&cmd.write, cmd.read_count))
            .collect()
    }

    /// SPI clock used for passthrough commands.
    pub fn spi_speed(&self) -> SpiSpeed {
        self.config.spi_speed
    }

    /// Change the SPI clock for subsequent commands.
    pub fn set_spi_speed(&mut self, speed: SpiSpeed) {
        self.config.spi_speed = speed;
    }

    /// Current programmer configuration.
    pub fn config(&self) -> &ProgrammerConfig {
        &self.config
    }

    /// Borrow the underlying link.
    pub fn link(&self) -> &Link<T, S> {
        &self.link
    }

    /// Release the transport.
    pub fn shutdown(self) -> Result<()> {
        let (mut transport, _sequence) = self.link.into_parts();
        transport.shutdown()?;
        debug!("programmer shut down");
        Ok(())
    }
}

impl<T: std::fmt::Debug, S: std::fmt::Debug> std::fmt::Debug for Programmer<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Programmer")
            .field("link", &self.link)
            .field("config", &self.config)
            .field("initialized", &self.initialized)
            .finish()
    }
}
