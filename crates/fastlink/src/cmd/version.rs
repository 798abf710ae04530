use fastlink::codec::{DEFAULT_READ_BUFFER_SIZE, HEADER_SIZE, MAX_PAYLOAD};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("fastlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: fastlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: cli=true");
    println!("frame_header_bytes: {HEADER_SIZE}");
    println!("max_payload_bytes: {MAX_PAYLOAD}");
    println!("default_read_buffer_bytes: {DEFAULT_READ_BUFFER_SIZE}");

    Ok(SUCCESS)
}
