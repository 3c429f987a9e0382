use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// In-memory transport that stands in for the programmer.
///
/// Bytes pushed with [`push_incoming`](Self::push_incoming) are what the host
/// will read. An optional responder sees every write and returns the bytes the
/// "device" answers with. Reads never block: when the receive queue is empty
/// they return a short count immediately, which the caller sees as a timeout.
#[derive(Default)]
pub struct MemoryTransport {
    incoming: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    responder: Option<Responder>,
    discards: usize,
    closed: bool,
}

impl MemoryTransport {
    /// Create an empty transport with no responder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose device side answers every write via `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    /// Queue bytes for the host to read.
    pub fn push_incoming(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }

    /// Bytes queued but not read yet.
    pub fn pending_incoming(&self) -> Vec<u8> {
        self.incoming.iter().copied().collect()
    }

    /// Every write the host made, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Number of times the receive queue was discarded.
    pub fn discard_count(&self) -> usize {
        self.discards
    }

    /// Whether [`Transport::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(TransportError::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.writes.push(bytes.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            let reply = responder(bytes);
            self.incoming.extend(reply);
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        self.ensure_open()?;
        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.incoming.clear();
        self.discards += 1;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("incoming", &self.incoming.len())
            .field("writes", &self.writes.len())
            .field("responder", &self.responder.is_some())
            .field("discards", &self.discards)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_WAIT: Duration = Duration::from_millis(0);

    #[test]
    fn reads_queued_bytes_in_order() {
        let mut transport = MemoryTransport::new();
        transport.push_incoming(&[1, 2, 3, 4, 5]);

        let mut buf = [0u8; 3];
        assert_eq!(transport.recv(&mut buf, NO_WAIT).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(transport.pending_incoming(), vec![4, 5]);
    }

    #[test]
    fn short_read_when_queue_runs_dry() {
        let mut transport = MemoryTransport::new();
        transport.push_incoming(&[9]);

        let mut buf = [0u8; 4];
        assert_eq!(transport.recv(&mut buf, NO_WAIT).unwrap(), 1);
        assert_eq!(transport.recv(&mut buf, NO_WAIT).unwrap(), 0);
    }

    #[test]
    fn responder_answers_each_write() {
        let mut transport =
            MemoryTransport::with_responder(|req| req.iter().rev().copied().collect());
        transport.send(&[1, 2, 3]).unwrap();

        let mut buf = [0u8; 3];
        transport.recv(&mut buf, NO_WAIT).unwrap();
        assert_eq!(buf, [3, 2, 1]);
        assert_eq!(transport.writes(), &[vec![1, 2, 3]]);
    }

    #[test]
    fn discard_drops_pending_bytes() {
        let mut transport = MemoryTransport::new();
        transport.push_incoming(&[0xAA; 8]);
        transport.discard_input().unwrap();

        assert!(transport.pending_incoming().is_empty());
        assert_eq!(transport.discard_count(), 1);
    }

    #[test]
    fn operations_fail_after_shutdown() {
        let mut transport = MemoryTransport::new();
        transport.shutdown().unwrap();

        assert!(transport.is_closed());
        assert!(matches!(transport.send(&[0]), Err(TransportError::Shutdown)));
        let mut buf = [0u8; 1];
        assert!(matches!(
            transport.recv(&mut buf, NO_WAIT),
            Err(TransportError::Shutdown)
        ));
    }

    #[test]
    fn boxed_transport_forwards() {
        let mut boxed: Box<dyn Transport> = Box::new(MemoryTransport::new());
        boxed.send(&[7]).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(boxed.recv(&mut buf, NO_WAIT).unwrap(), 0);
    }
}
