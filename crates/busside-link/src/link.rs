use std::thread;
use std::time::Duration;

use busside_frame::{
    await_marker, command_name, read_reply, send_frame, EncodedFrame, Frame, FrameConfig,
    FrameError, ReplyExpectation,
};
use busside_transport::Transport;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::command::Request;
use crate::error::{LinkError, Result};
use crate::sequence::{SequenceCounter, SequenceStore};

/// Timing of the retry loop.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Pause after a failed attempt, before discarding input and re-sending.
    /// Default: 5 ms.
    pub retry_delay: Duration,
    /// Per-attempt marker and read budgets.
    pub frame: FrameConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(5),
            frame: FrameConfig::default(),
        }
    }
}

/// Why a single attempt failed. Only ever logged; the caller sees
/// [`LinkError::RetriesExhausted`] if every attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    /// No marker, or not enough bytes, within the budget.
    TransportTimeout,
    /// Something arrived but failed length, sequence or checksum validation.
    FrameMismatch,
}

impl AttemptFailure {
    pub fn classify(err: &FrameError) -> Self {
        if err.is_timeout() || matches!(err, FrameError::Transport(_)) {
            AttemptFailure::TransportTimeout
        } else {
            AttemptFailure::FrameMismatch
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttemptFailure::TransportTimeout => "transport_timeout",
            AttemptFailure::FrameMismatch => "frame_mismatch",
        }
    }
}

/// One request in flight at a time over a lossy transport.
///
/// Each attempt: stamp a fresh sequence number, send marker + frame, hunt for
/// the reply marker, read and validate the reply. Any failure pauses, drops
/// whatever is buffered (so a late reply to this attempt cannot be taken for
/// the next one) and starts over, up to the caller's attempt budget.
pub struct Link<T, S> {
    transport: T,
    sequence: SequenceCounter<S>,
    config: LinkConfig,
}

impl<T: Transport, S: SequenceStore> Link<T, S> {
    pub fn new(transport: T, sequence: SequenceCounter<S>, config: LinkConfig) -> Self {
        Self {
            transport,
            sequence,
            config,
        }
    }

    /// Run `request` to completion and return the reply payload.
    ///
    /// Sequence store failures abort immediately: carrying on could reuse a
    /// number the device has already seen.
    pub fn exchange(&mut self, request: &Request, max_attempts: u32) -> Result<Bytes> {
        let mut frame = request.encode()?;
        let command = command_name(request.command());

        for attempt in 1..=max_attempts {
            let sequence_number = self.sequence.next()?;
            frame.restamp(sequence_number);
            let expect = ReplyExpectation {
                sequence_number,
                payload_length: request.expected_reply_len(),
            };

            match self.attempt(&frame, expect) {
                Ok(reply) => {
                    debug!(
                        command,
                        attempt,
                        sequence = sequence_number,
                        reply_len = reply.payload.len(),
                        "exchange complete"
                    );
                    return Ok(reply.payload);
                }
                Err(err) => {
                    warn!(
                        command,
                        attempt,
                        max_attempts,
                        sequence = sequence_number,
                        kind = AttemptFailure::classify(&err).as_str(),
                        error = %err,
                        "exchange attempt failed"
                    );
                    self.recover();
                }
            }
        }

        Err(LinkError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    fn attempt(
        &mut self,
        frame: &EncodedFrame,
        expect: ReplyExpectation,
    ) -> std::result::Result<Frame, FrameError> {
        let timing = &self.config.frame;
        send_frame(&mut self.transport, frame)?;
        await_marker(
            &mut self.transport,
            timing.sync_timeout,
            timing.sync_poll_interval,
        )?;
        read_reply(&mut self.transport, expect, timing.read_timeout)
    }

    fn recover(&mut self) {
        thread::sleep(self.config.retry_delay);
        if let Err(err) = self.transport.discard_input() {
            warn!(error = %err, "failed to discard buffered input");
        }
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Borrow the sequence counter.
    pub fn sequence(&self) -> &SequenceCounter<S> {
        &self.sequence
    }

    /// Current link configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Consume the link and return transport and counter.
    pub fn into_parts(self) -> (T, SequenceCounter<S>) {
        (self.transport, self.sequence)
    }
}

impl<T: std::fmt::Debug, S: std::fmt::Debug> std::fmt::Debug for Link<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("transport", &self.transport)
            .field("sequence", &self.sequence)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use busside_frame::{decode_frame, encode_frame, HEADER_SIZE, MARKER, PROBE, SPI_PASSTHROUGH};
    use busside_transport::MemoryTransport;

    use super::*;
    use crate::command::SpiSpeed;
    use crate::sequence::MemorySequenceStore;

    pub(crate) fn fast_config() -> LinkConfig {
        LinkConfig {
            retry_delay: Duration::from_millis(1),
            frame: FrameConfig {
                sync_timeout: Duration::from_millis(20),
                sync_poll_interval: Duration::from_millis(5),
                read_timeout: Duration::from_millis(5),
            },
        }
    }

    /// Encode a reply frame, marker included.
    pub(crate) fn reply(command: u32, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut wire = MARKER.to_vec();
        encode_frame(command, seq, payload, &mut wire).unwrap();
        wire
    }

    /// Device double: decodes each request and lets `answer` decide the reply.
    /// `answer` gets the 1-based attempt number and the decoded request.
    pub(crate) fn device<F>(mut answer: F) -> MemoryTransport
    where
        F: FnMut(u32, &Frame) -> Vec<u8> + Send + 'static,
    {
        let mut attempt = 0;
        MemoryTransport::with_responder(move |wire| {
            assert_eq!(&wire[..2], &MARKER, "request must start with the marker");
            let request = decode_frame(&wire[2..]).expect("request frame should be valid");
            attempt += 1;
            answer(attempt, &request)
        })
    }

    fn link(
        transport: MemoryTransport,
        store: MemorySequenceStore,
    ) -> Link<MemoryTransport, MemorySequenceStore> {
        Link::new(transport, SequenceCounter::open(store).unwrap(), fast_config())
    }

    #[test]
    fn probe_with_matching_reply_succeeds() {
        let transport = device(|_, req| {
            assert_eq!(req.command, PROBE);
            assert_eq!(req.sequence_number, 5);
            reply(PROBE, 5, &[])
        });
        let mut link = link(transport, MemorySequenceStore::with_value(5));

        let payload = link.exchange(&Request::probe(), 1).unwrap();
        assert!(payload.is_empty());
        assert_eq!(link.transport().writes().len(), 1);
    }

    #[test]
    fn probe_reply_with_wrong_sequence_is_retried() {
        let transport = device(|_, _| reply(PROBE, 6, &[]));
        let mut link = link(transport, MemorySequenceStore::with_value(5));

        let err = link.exchange(&Request::probe(), 1).unwrap_err();
        assert!(matches!(err, LinkError::RetriesExhausted { attempts: 1 }));
    }

    #[test]
    fn retry_restamps_with_next_sequence() {
        // The device always answers "6"; the first attempt (5) is rejected, the
        // re-stamped second attempt (6) matches.
        let transport = device(|_, _| reply(PROBE, 6, &[]));
        let mut link = link(transport, MemorySequenceStore::with_value(5));

        link.exchange(&Request::probe(), 2).unwrap();

        let writes = link.transport().writes();
        assert_eq!(writes.len(), 2);
        let first = decode_frame(&writes[0][2..]).unwrap();
        let second = decode_frame(&writes[1][2..]).unwrap();
        assert_eq!((first.sequence_number, second.sequence_number), (5, 6));
        assert_eq!(first.payload, second.payload);
        assert_eq!(link.transport().discard_count(), 1);
    }

    #[test]
    fn succeeds_after_k_failed_attempts() {
        let k = 3;
        let transport = device(move |attempt, req| {
            if attempt <= k {
                // Garbage, a stale reply and a corrupted reply, in turn.
                match attempt {
                    1 => vec![0x00, 0x13, 0x37],
                    2 => reply(SPI_PASSTHROUGH, req.sequence_number.wrapping_sub(1), &[9, 9, 9]),
                    _ => {
                        let mut bad = reply(SPI_PASSTHROUGH, req.sequence_number, &[1, 2, 3]);
                        let last = bad.len() - 1;
                        bad[last] ^= 0xFF;
                        bad
                    }
                }
            } else {
                reply(SPI_PASSTHROUGH, req.sequence_number, &[0xC2, 0x20, 0x17])
            }
        });
        let mut link = link(transport, MemorySequenceStore::new());

        let request = Request::spi(SpiSpeed::Mhz8, &[0x9F], 3).unwrap();
        let payload = link.exchange(&request, 10).unwrap();

        assert_eq!(payload.as_ref(), &[0xC2, 0x20, 0x17]);
        assert_eq!(link.transport().writes().len(), k as usize + 1);
    }

    #[test]
    fn always_failing_transport_exhausts_exactly_max_attempts() {
        let transport = device(|_, _| Vec::new());
        let mut link = link(transport, MemorySequenceStore::new());

        let err = link.exchange(&Request::probe(), 4).unwrap_err();

        assert!(matches!(err, LinkError::RetriesExhausted { attempts: 4 }));
        assert_eq!(link.transport().writes().len(), 4);
        assert_eq!(link.transport().discard_count(), 4);
    }

    #[test]
    fn unexpected_reply_length_is_retried() {
        let transport = device(|attempt, req| {
            let payload: &[u8] = if attempt == 1 { &[1, 2, 3, 4] } else { &[1, 2, 3] };
            reply(SPI_PASSTHROUGH, req.sequence_number, payload)
        });
        let mut link = link(transport, MemorySequenceStore::new());

        let request = Request::spi(SpiSpeed::Mhz1, &[0x03, 0, 0, 0], 3).unwrap();
        let payload = link.exchange(&request, 3).unwrap();
        assert_eq!(payload.as_ref(), &[1, 2, 3]);
        assert_eq!(link.transport().writes().len(), 2);
    }

    #[test]
    fn stale_bytes_are_discarded_between_attempts() {
        // First answer: a valid reply followed by junk that would poison the
        // next attempt if it were not discarded.
        let transport = device(|attempt, req| {
            if attempt == 1 {
                let mut wire = reply(PROBE, req.sequence_number + 100, &[]);
                wire.extend(reply(PROBE, req.sequence_number + 1, &[]));
                wire
            } else {
                reply(PROBE, req.sequence_number, &[])
            }
        });
        let mut link = link(transport, MemorySequenceStore::new());

        link.exchange(&Request::probe(), 2).unwrap();
        assert!(link.transport().pending_incoming().is_empty());
    }

    #[test]
    fn noise_before_reply_marker_is_skipped() {
        let transport = device(|_, req| {
            let mut wire = vec![0x11, 0xFE, 0x00, 0xFE, 0xFE];
            wire.extend(reply(PROBE, req.sequence_number, &[]));
            wire
        });
        let mut link = link(transport, MemorySequenceStore::new());
        link.exchange(&Request::probe(), 1).unwrap();
    }

    #[test]
    fn store_failure_aborts_without_sending() {
        let store = MemorySequenceStore::new();
        let mut link = link(device(|_, _| Vec::new()), store.clone());
        store.set_unavailable(true);

        let err = link.exchange(&Request::probe(), 5).unwrap_err();
        assert!(matches!(err, LinkError::StoreUnavailable(_)));
        assert!(link.transport().writes().is_empty());
    }

    #[test]
    fn every_attempt_consumes_a_sequence_number() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let transport = device(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        });
        let store = MemorySequenceStore::new();
        let mut link = link(transport, store.clone());

        let _ = link.exchange(&Request::probe(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.value(), Some(2 + 3));
    }

    #[test]
    fn zero_attempts_never_sends() {
        let mut link = link(device(|_, _| Vec::new()), MemorySequenceStore::new());
        let err = link.exchange(&Request::probe(), 0).unwrap_err();
        assert!(matches!(err, LinkError::RetriesExhausted { attempts: 0 }));
        assert!(link.transport().writes().is_empty());
    }

    #[test]
    fn header_only_reply_for_spi_read_is_rejected() {
        let transport = device(|_, req| {
            let mut wire = reply(SPI_PASSTHROUGH, req.sequence_number, &[5, 6]);
            wire.truncate(MARKER.len() + HEADER_SIZE);
            wire
        });
        let mut link = link(transport, MemorySequenceStore::new());

        let request = Request::spi(SpiSpeed::Mhz8, &[], 2).unwrap();
        assert!(matches!(
            link.exchange(&request, 2),
            Err(LinkError::RetriesExhausted { attempts: 2 })
        ));
    }

    #[test]
    fn classifies_attempt_failures() {
        assert_eq!(
            AttemptFailure::classify(&FrameError::SyncTimeout(Duration::from_secs(3))),
            AttemptFailure::TransportTimeout
        );
        assert_eq!(
            AttemptFailure::classify(&FrameError::SequenceMismatch {
                expected: 1,
                actual: 2
            }),
            AttemptFailure::FrameMismatch
        );
    }
}
