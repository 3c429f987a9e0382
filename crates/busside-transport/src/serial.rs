use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Line rate the BUSSide firmware listens on.
pub const DEFAULT_BAUD_RATE: u32 = 500_000;

/// Initial port timeout; every read overrides it with its own budget.
const OPEN_TIMEOUT: Duration = Duration::from_millis(100);

/// Longest single read wait; larger timeouts are clamped to this.
pub const MAX_READ_WAIT: Duration = Duration::from_secs(60 * 60);

/// Serial port transport, 8 data bits, no parity, 1 stop bit, no flow control.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl SerialTransport {
    /// Open `path` at `baud_rate` (8N1).
    pub fn open(path: impl Into<String>, baud_rate: u32) -> Result<Self> {
        let path = path.into();
        let port = serialport::new(path.as_str(), baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(OPEN_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;
        debug!(%path, baud_rate, "serial port opened");
        Ok(Self {
            port: Some(port),
            path,
        })
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        let path = port.name().unwrap_or_else(|| "<unnamed>".to_string());
        Self {
            port: Some(port),
            path,
        }
    }

    /// Device path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Shutdown)
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()?;
        trace!(len = bytes.len(), "serial write");
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port_mut()?;
        let deadline = read_deadline(Instant::now(), timeout);
        let mut filled = 0usize;

        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            port.set_timeout(remaining)?;
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock =>
                {
                    break
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        trace!(requested = buf.len(), read = filled, "serial read");
        Ok(filled)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port_mut()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!(path = %self.path, "serial port released");
        }
        Ok(())
    }
}

fn read_deadline(start: Instant, timeout: Duration) -> Instant {
    start.checked_add(timeout.min(MAX_READ_WAIT)).unwrap_or(start)
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("open", &self.port.is_some())
            .finish()
    }
}
