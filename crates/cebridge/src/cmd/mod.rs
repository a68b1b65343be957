use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod serve;
pub mod tools;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server on the instrument host.
    Serve(ServeArgs),
    /// Invoke one tool through a relay server and print the result.
    Call(CallArgs),
    /// List the tool catalogue.
    Tools(ToolsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Call(args) => call::run(args, format),
        Command::Tools(args) => tools::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "CE_BRIDGE_BIND", default_value = cebridge_relay::DEFAULT_BIND_HOST)]
    pub bind: String,
    /// Port to listen on.
    #[arg(long, env = "CE_BRIDGE_PORT", default_value_t = cebridge_transport::DEFAULT_PORT)]
    pub port: u16,
    /// Instrument channel name, or an explicit socket/pipe path.
    #[arg(
        long,
        env = "CE_BRIDGE_CHANNEL",
        default_value = cebridge_transport::DEFAULT_CHANNEL_NAME
    )]
    pub channel: String,
    /// Run sessions as tokio tasks instead of threads.
    #[cfg(feature = "async")]
    #[arg(long = "async")]
    pub use_async: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Tool name (see `cebridge tools`).
    pub tool: String,
    /// Tool arguments as a JSON object.
    #[arg(long, default_value = "{}")]
    pub params: String,
    /// Relay server host.
    #[arg(long, env = "CE_REMOTE_HOST", default_value = cebridge_relay::DEFAULT_REMOTE_HOST)]
    pub host: String,
    /// Relay server port.
    #[arg(long, env = "CE_REMOTE_PORT", default_value_t = cebridge_transport::DEFAULT_PORT)]
    pub port: u16,
    /// Connect timeout (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct ToolsArgs {
    /// Show only this tool.
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
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
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }
}
