use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("busside {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: busside");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("BUSSIDE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("BUSSIDE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("baud_rate: {}", busside_transport::DEFAULT_BAUD_RATE);
    println!("sequence_file: {}", busside_link::DEFAULT_SEQUENCE_PATH);
    println!(
        "transfer_limits: read={} write={}",
        busside_link::MAX_DATA_READ,
        busside_link::MAX_DATA_WRITE
    );

    Ok(SUCCESS)
}
