use std::io::{IsTerminal, Write};

use busside_link::SpiSpeed;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct ProbeOutput<'a> {
    pub device: &'a str,
    pub spi_speed: &'static str,
    pub next_sequence: u32,
    pub responding: bool,
}

#[derive(Serialize)]
pub struct SpiOutput<'a> {
    pub device: &'a str,
    pub spi_speed: &'static str,
    pub write: String,
    pub read_count: usize,
    pub data: String,
}

#[derive(Serialize)]
struct SpeedRow {
    code: u8,
    name: &'static str,
    frequency_hz: u32,
    default: bool,
}

pub fn print_probe(out: &ProbeOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "SPI SPEED", "NEXT SEQ", "STATUS"])
                .add_row(vec![
                    out.device.to_string(),
                    out.spi_speed.to_string(),
                    out.next_sequence.to_string(),
                    "responding".to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Programmer:");
            println!("  Device:        {}", out.device);
            println!("  SPI speed:     {}", out.spi_speed);
            println!("  Next sequence: {}", out.next_sequence);
            println!("  Status:        responding");
        }
        OutputFormat::Raw => println!("ok"),
    }
}

pub fn print_spi(out: &SpiOutput<'_>, data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OFFSET", "HEX", "ASCII"]);
            for (index, row) in data.chunks(16).enumerate() {
                table.add_row(vec![
                    format!("{:08x}", index * 16),
                    hex(row),
                    ascii(row),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "device={} speed={} wrote={} read={}",
                out.device,
                out.spi_speed,
                if out.write.is_empty() { "-" } else { out.write.as_str() },
                out.read_count
            );
            for (index, row) in data.chunks(16).enumerate() {
                println!("  {:08x}  {:<47}  |{}|", index * 16, hex(row), ascii(row));
            }
        }
        OutputFormat::Raw => print_raw(data),
    }
}

pub fn print_speeds(current: SpiSpeed, format: OutputFormat) {
    let rows: Vec<SpeedRow> = SpiSpeed::ALL
        .into_iter()
        .map(|speed| SpeedRow {
            code: speed.code(),
            name: speed.name(),
            frequency_hz: speed.frequency_hz(),
            default: speed == current,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CODE", "NAME", "FREQUENCY (Hz)", "DEFAULT"]);
            for row in &rows {
                table.add_row(vec![
                    row.code.to_string(),
                    row.name.to_string(),
                    row.frequency_hz.to_string(),
                    if row.default { "*" } else { "" }.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                let marker = if row.default { " (default)" } else { "" };
                println!("{} {:>5} {:>9} Hz{marker}", row.code, row.name, row.frequency_hz);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Space-separated lowercase hex, e.g. `ef 40 18`.
pub fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn ascii(data: &[u8]) -> String {
    data.iter()
        .map(|&byte| {
            if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '.'
            }
        })
        .collect()
}
