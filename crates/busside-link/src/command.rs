use std::fmt;
use std::str::FromStr;

use busside_frame::{EncodedFrame, PROBE, SPI_PASSTHROUGH};

use crate::error::{LinkError, Result};

/// Fixed pin-configuration words the firmware expects after the clock word.
pub const SPI_PIN_CONFIG: [u32; 4] = [9, 6, 8, 7];

/// Size of the SPI argument block in 32-bit words.
pub const SPI_ARGUMENT_WORDS: usize = 7;

/// SPI clock speeds supported by the programmer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpiSpeed {
    Khz30,
    Khz125,
    Khz250,
    Mhz1,
    Mhz2,
    Mhz2_6,
    Mhz4,
    #[default]
    Mhz8,
}

impl SpiSpeed {
    /// Every speed, slowest first.
    pub const ALL: [SpiSpeed; 8] = [
        SpiSpeed::Khz30,
        SpiSpeed::Khz125,
        SpiSpeed::Khz250,
        SpiSpeed::Mhz1,
        SpiSpeed::Mhz2,
        SpiSpeed::Mhz2_6,
        SpiSpeed::Mhz4,
        SpiSpeed::Mhz8,
    ];

    /// Name as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            SpiSpeed::Khz30 => "30k",
            SpiSpeed::Khz125 => "125k",
            SpiSpeed::Khz250 => "250k",
            SpiSpeed::Mhz1 => "1M",
            SpiSpeed::Mhz2 => "2M",
            SpiSpeed::Mhz2_6 => "2.6M",
            SpiSpeed::Mhz4 => "4M",
            SpiSpeed::Mhz8 => "8M",
        }
    }

    /// Position in the programmer's speed table.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Clock frequency in Hz. This is the word sent in the argument block.
    pub fn frequency_hz(self) -> u32 {
        match self {
            SpiSpeed::Khz30 => 30_000,
            SpiSpeed::Khz125 => 125_000,
            SpiSpeed::Khz250 => 250_000,
            SpiSpeed::Mhz1 => 1_000_000,
            SpiSpeed::Mhz2 => 2_000_000,
            SpiSpeed::Mhz2_6 => 2_600_000,
            SpiSpeed::Mhz4 => 4_000_000,
            SpiSpeed::Mhz8 => 8_000_000,
        }
    }
}

impl fmt::Display for SpiSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpiSpeed {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        SpiSpeed::ALL
            .into_iter()
            .find(|speed| speed.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LinkError::UnknownSpeed(s.to_string()))
    }
}

/// One SPI transaction: write these bytes, then clock in `read_count` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpiCommand {
    pub write: Vec<u8>,
    pub read_count: usize,
}

impl SpiCommand {
    pub fn new(write: impl Into<Vec<u8>>, read_count: usize) -> Self {
        Self {
            write: write.into(),
            read_count,
        }
    }
}

/// A request to the programmer and the reply size it calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    command: u32,
    payload: Vec<u8>,
    reply_len: u32,
}

impl Request {
    /// Liveness probe: no payload, no reply payload.
    pub fn probe() -> Self {
        Self {
            command: PROBE,
            payload: Vec::new(),
            reply_len: 0,
        }
    }

    /// SPI passthrough.
    ///
    /// Payload layout (little-endian words):
    /// ```text
    /// [clock Hz][9][6][8][7][write count][read count][write bytes...]
    /// ```
    pub fn spi(speed: SpiSpeed, write: &[u8], read_count: usize) -> Result<Self> {
        let write_count = count_word("write", write.len())?;
        let reply_len = count_word("read", read_count)?;

        let size = SPI_ARGUMENT_WORDS * 4 + write.len();
        let mut payload = Vec::new();
        payload
            .try_reserve_exact(size)
            .map_err(|_| LinkError::AllocationFailure { size })?;

        payload.extend_from_slice(&speed.frequency_hz().to_le_bytes());
        for word in SPI_PIN_CONFIG {
            payload.extend_from_slice(&word.to_le_bytes());
        }
        payload.extend_from_slice(&write_count.to_le_bytes());
        payload.extend_from_slice(&reply_len.to_le_bytes());
        payload.extend_from_slice(write);

        Ok(Self {
            command: SPI_PASSTHROUGH,
            payload,
            reply_len,
        })
    }

    pub fn command(&self) -> u32 {
        self.command
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Exact payload length a valid reply must declare.
    pub fn expected_reply_len(&self) -> u32 {
        self.reply_len
    }

    /// Build the wire frame. The sequence number is a placeholder; the link
    /// stamps a real one before every send.
    pub fn encode(&self) -> Result<EncodedFrame> {
        Ok(EncodedFrame::encode(self.command, 0, &self.payload)?)
    }
}

fn count_word(direction: &'static str, count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| LinkError::TransferTooLarge {
        direction,
        size: count,
        max: u32::MAX as usize,
    })
}
