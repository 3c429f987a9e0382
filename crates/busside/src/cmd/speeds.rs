use crate::cmd::SpeedsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_speeds, OutputFormat};

pub fn run(args: SpeedsArgs, format: OutputFormat) -> CliResult<i32> {
    print_speeds(args.spi_speed, format);
    Ok(SUCCESS)
}
