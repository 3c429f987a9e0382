use busside_link::connect_with_config;
use tracing::debug;

use crate::cmd::ProbeArgs;
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_probe, OutputFormat, ProbeOutput};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.to_config()?;
    let device = args.connect.device.as_str();

    let programmer =
        connect_with_config(device, &config).map_err(|err| link_error("probe failed", err))?;
    debug!(device, "probe handshake complete");

    let out = ProbeOutput {
        device,
        spi_speed: programmer.spi_speed().name(),
        next_sequence: programmer.link().sequence().peek(),
        responding: true,
    };
    programmer
        .shutdown()
        .map_err(|err| link_error("close failed", err))?;

    print_probe(&out, format);
    Ok(SUCCESS)
}
