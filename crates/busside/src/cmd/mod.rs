use std::path::PathBuf;
use std::time::Duration;

use busside_link::{ConnectConfig, SpiSpeed, DEFAULT_ATTEMPTS, DEFAULT_SEQUENCE_PATH};
use busside_transport::{DEFAULT_BAUD_RATE, MAX_READ_WAIT};
use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod probe;
pub mod speeds;
pub mod spi;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the device and run the probe handshake.
    Probe(ProbeArgs),
    /// Run one SPI passthrough transaction.
    Spi(SpiArgs),
    /// List supported SPI clock speeds.
    Speeds(SpeedsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format),
        Command::Spi(args) => spi::run(args, format),
        Command::Speeds(args) => speeds::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Device and link settings shared by every command that talks to hardware.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Serial device the programmer is attached to.
    #[arg(long, short = 'd', env = "BUSSIDE_DEVICE")]
    pub device: String,
    /// Serial line rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// File holding the persisted sequence counter.
    #[arg(long, env = "BUSSIDE_SEQ_FILE", default_value = DEFAULT_SEQUENCE_PATH)]
    pub seq_file: PathBuf,
    /// SPI clock (see `busside speeds`).
    #[arg(long, default_value = "8M", value_parser = parse_speed)]
    pub spi_speed: SpiSpeed,
    /// Attempts per request before giving up.
    #[arg(long, default_value_t = DEFAULT_ATTEMPTS)]
    pub attempts: u32,
    /// Time to wait for a reply marker per attempt (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub sync_timeout: String,
    /// Time to wait for the reply body per attempt (e.g. 2s, 2000ms).
    #[arg(long, default_value = "2000ms")]
    pub read_timeout: String,
}

impl ConnectArgs {
    pub fn to_config(&self) -> CliResult<ConnectConfig> {
        let mut config = ConnectConfig {
            baud_rate: self.baud,
            sequence_path: self.seq_file.clone(),
            ..ConnectConfig::default()
        };
        let programmer = &mut config.programmer;
        programmer.spi_speed = self.spi_speed;
        programmer.probe_attempts = self.attempts;
        programmer.command_attempts = self.attempts;
        programmer.link.frame.sync_timeout = parse_duration("sync-timeout", &self.sync_timeout)?;
        programmer.link.frame.read_timeout = parse_duration("read-timeout", &self.read_timeout)?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct SpiArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Bytes to clock out, as hex (e.g. "9f", "03 00 10 00", "0x03,0x00").
    #[arg(long, short = 'w', default_value = "")]
    pub write: String,
    /// Number of bytes to clock in after the write.
    #[arg(long, short = 'r', default_value_t = 0)]
    pub read: usize,
}

#[derive(Args, Debug)]
pub struct SpeedsArgs {
    /// Speed to mark as selected.
    #[arg(long, default_value = "8M", value_parser = parse_speed)]
    pub spi_speed: SpiSpeed,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_speed(input: &str) -> Result<SpiSpeed, String> {
    input.parse().map_err(|err| format!("{err}"))
}

pub fn parse_duration(name: &str, input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage(format!("{name} must not be empty")));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid {name} value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage(format!("{name} must be greater than zero")));
    }

    let duration = if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    };
    if duration > MAX_READ_WAIT {
        return Err(CliError::usage(format!(
            "{name} must not exceed {}s",
            MAX_READ_WAIT.as_secs()
        )));
    }
    Ok(duration)
}

/// Parse a hex byte string. Bytes may be run together (`9f0001`) or split by
/// spaces, commas or colons, each optionally prefixed with `0x`.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in input
        .split(|c: char| c.is_ascii_whitespace() || c == ',' || c == ':')
        .filter(|token| !token.is_empty())
    {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CliError::usage(format!("invalid hex '{token}'")));
        }
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(CliError::usage(format!(
                "invalid hex '{token}': expected whole bytes"
            )));
        }
        for pair in digits.as_bytes().chunks(2) {
            bytes.push((hex_digit(pair[0]) << 4) | hex_digit(pair[1]));
        }
    }
    Ok(bytes)
}

fn hex_digit(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn parse_hex_forms() {
        assert_eq!(parse_hex("9f").unwrap(), vec![0x9F]);
        assert_eq!(parse_hex("030010 00").unwrap(), vec![0x03, 0x00, 0x10, 0x00]);
        assert_eq!(parse_hex("0x03,0X00:ff").unwrap(), vec![0x03, 0x00, 0xFF]);
        assert!(parse_hex("").unwrap().is_empty());
        assert!(parse_hex("   ").unwrap().is_empty());
    }

    #[test]
    fn parse_hex_rejects_garbage() {
        assert_eq!(parse_hex("9").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("0x").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("+1").unwrap_err().code, USAGE);
        assert!(parse_hex("é1").is_err());
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("t", "3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("t", "2").unwrap(), Duration::from_secs(2));
        assert_eq!(
            parse_duration("t", "2000ms").unwrap(),
            Duration::from_millis(2000)
        );
        assert!(parse_duration("t", "0ms").is_err());
        assert!(parse_duration("t", "soon").is_err());
    }

    #[test]
    fn parse_duration_rejects_waits_beyond_an_hour() {
        assert_eq!(parse_duration("t", "3600s").unwrap(), MAX_READ_WAIT);
        let err = parse_duration("read-timeout", "18446744073709551615s").unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("must not exceed 3600s"));
        assert!(parse_duration("t", "3600001ms").is_err());
    }

    #[test]
    fn connect_args_map_onto_config() {
        let args = ConnectArgs {
            device: "/dev/ttyUSB0".into(),
            baud: 115_200,
            seq_file: PathBuf::from("/tmp/x.seq"),
            spi_speed: SpiSpeed::Khz125,
            attempts: 4,
            sync_timeout: "500ms".into(),
            read_timeout: "1s".into(),
        };
        let config = args.to_config().unwrap();

        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.sequence_path, PathBuf::from("/tmp/x.seq"));
        assert_eq!(config.programmer.spi_speed, SpiSpeed::Khz125);
        assert_eq!(config.programmer.command_attempts, 4);
        assert_eq!(
            config.programmer.link.frame.sync_timeout,
            Duration::from_millis(500)
        );
        assert_eq!(
            config.programmer.link.frame.read_timeout,
            Duration::from_secs(1)
        );
    }
}
