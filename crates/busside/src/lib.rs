//! Host driver for the BUSSide SPI programmer.
//!
//! The programmer sits on a serial line and relays SPI transactions. This
//! crate gets them there and back intact: framed, checksummed, sequence
//! numbered and retried.
//!
//! # Crate Structure
//!
//! - [`transport`]: Raw byte transport (serial port, in-memory double)
//! - [`frame`]: Frame codec, CRC-32, marker resynchronization
//! - [`link`]: Sequence counter, retry loop, SPI programmer interface
//!
//! ```no_run
//! use busside::link::connect;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut programmer = connect("/dev/ttyUSB0")?;
//!     let id = programmer.execute_spi(&[0x9F], 3)?;
//!     println!("JEDEC id: {id:02x?}");
//!     programmer.shutdown()?;
//!     Ok(())
//! }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use busside_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use busside_frame::*;
}

/// Re-export link and programmer types.
pub mod link {
    pub use busside_link::*;
}
