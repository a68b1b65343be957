use cebridge_relay::{ClientConfig, RelayClient};
use cebridge_tools::{is_failure, CommandSurface};
use serde_json::{Map, Value};

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_call_result, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    if cebridge_tools::find(&args.tool).is_none() {
        return Err(CliError::new(
            USAGE,
            format!("unknown tool '{}' (see `cebridge tools`)", args.tool),
        ));
    }
    let params = parse_params(&args.params)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;

    let config = ClientConfig::new(args.host.clone(), args.port)
        .with_connect_timeout(connect_timeout)
        .with_io_timeout(Some(connect_timeout));
    let mut surface = CommandSurface::new(RelayClient::new(config));

    let text = surface.dispatch(&args.tool, &params);
    print_call_result(&args.tool, &text, format);

    Ok(if is_failure(&text) { FAILURE } else { SUCCESS })
}

fn parse_params(raw: &str) -> CliResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::new(
            USAGE,
            format!("--params must be a JSON object, got {other}"),
        )),
        Err(err) => Err(CliError::new(
            USAGE,
            format!("--params is not valid JSON: {err}"),
        )),
    }
}
