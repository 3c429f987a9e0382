mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "busside", version, about = "BUSSide SPI programmer CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spi_subcommand() {
        let cli = Cli::try_parse_from([
            "busside",
            "spi",
            "--device",
            "/dev/ttyUSB0",
            "--write",
            "9f",
            "--read",
            "3",
            "--spi-speed",
            "1M",
        ])
        .expect("spi args should parse");

        match cli.command {
            Command::Spi(args) => {
                assert_eq!(args.write, "9f");
                assert_eq!(args.read, 3);
                assert_eq!(args.connect.spi_speed, busside_link::SpiSpeed::Mhz1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_speed() {
        let err = Cli::try_parse_from([
            "busside",
            "probe",
            "--device",
            "/dev/ttyUSB0",
            "--spi-speed",
            "3M",
        ])
        .expect_err("unknown speed should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["busside", "speeds", "--format", "json"])
            .expect("global flag should parse after subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Speeds(_)));
    }
}
