use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("cebridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: cebridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("CEBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "channel: {} ({})",
        cebridge_transport::DEFAULT_CHANNEL_NAME,
        if cfg!(windows) {
            "named-pipe"
        } else {
            "unix-domain-socket"
        }
    );
    println!(
        "max_payload: {} bytes",
        cebridge_frame::DEFAULT_MAX_PAYLOAD
    );
    println!("tools: {}", cebridge_tools::TOOLS.len());
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
