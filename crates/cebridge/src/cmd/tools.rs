use cebridge_tools::{lookup, TOOLS};

use crate::cmd::ToolsArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_tools, OutputFormat};

pub fn run(args: ToolsArgs, format: OutputFormat) -> CliResult<i32> {
    match args.name.as_deref() {
        Some(name) => {
            let tool = lookup(name).map_err(|err| CliError::new(USAGE, err.to_string()))?;
            print_tools(std::slice::from_ref(tool), format);
        }
        None => print_tools(TOOLS, format),
    }
    Ok(SUCCESS)
}
