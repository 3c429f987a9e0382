use busside_link::connect_with_config;

use crate::cmd::{parse_hex, SpiArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{hex, print_spi, OutputFormat, SpiOutput};

pub fn run(args: SpiArgs, format: OutputFormat) -> CliResult<i32> {
    // Bad input never reaches the device or the sequence file.
    let write = parse_hex(&args.write)?;
    let config = args.connect.to_config()?;
    let device = args.connect.device.as_str();

    let mut programmer =
        connect_with_config(device, &config).map_err(|err| link_error("connect failed", err))?;
    let data = programmer
        .execute_spi(&write, args.read)
        .map_err(|err| link_error("spi command failed", err))?;
    programmer
        .shutdown()
        .map_err(|err| link_error("close failed", err))?;

    let out = SpiOutput {
        device,
        spi_speed: config.programmer.spi_speed.name(),
        write: hex(&write),
        read_count: args.read,
        data: hex(&data),
    };
    print_spi(&out, &data, format);
    Ok(SUCCESS)
}
