use std::time::Duration;

use crate::error::Result;

/// A raw, unframed byte transport to the programmer.
///
/// There is no framing below this trait: bytes may be lost, duplicated by a
/// stale reply, or arrive in arbitrary chunks. Recovering from that is the
/// job of the layers above.
pub trait Transport {
    /// Write all of `bytes` (blocking).
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read up to `buf.len()` bytes, giving up once `timeout` has elapsed.
    ///
    /// Returns the number of bytes actually read. A short count (including
    /// zero) means the timeout expired; it is not an error.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any bytes already received but not yet read.
    fn discard_input(&mut self) -> Result<()>;

    /// Release the underlying device.
    ///
    /// The default does nothing. What later calls do is up to each
    /// implementation; [`SerialTransport`](crate::SerialTransport) and
    /// [`MemoryTransport`](crate::MemoryTransport) fail them with
    /// [`TransportError::Shutdown`](crate::TransportError::Shutdown).
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).recv(buf, timeout)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }

    fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).recv(buf, timeout)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }

    fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown()
    }
}
