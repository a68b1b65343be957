use std::io::IsTerminal;

use cebridge_tools::ToolSpec;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

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
struct ToolOutput<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

pub fn print_tools(tools: &[ToolSpec], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<ToolOutput<'_>> = tools
                .iter()
                .map(|tool| ToolOutput {
                    name: tool.name,
                    description: tool.description,
                    input_schema: tool.input_schema(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TOOL", "SIGNATURE", "DESCRIPTION"]);
            for tool in tools {
                table.add_row(vec![
                    tool.name.to_string(),
                    tool.signature(),
                    tool.description.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for tool in tools {
                println!("{:<40} {}", tool.signature(), tool.description);
            }
        }
        OutputFormat::Raw => {
            for tool in tools {
                println!("{}", tool.name);
            }
        }
    }
}

/// Print the structured text returned by a tool call.
pub fn print_call_result(tool: &str, text: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => println!("{text}"),
        OutputFormat::Pretty => match serde_json::from_str::<Value>(text) {
            Ok(value) => println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
            ),
            Err(_) => println!("{text}"),
        },
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => {
                    for (key, value) in map {
                        table.add_row(vec![key, cell(&value)]);
                    }
                }
                _ => {
                    table.add_row(vec![tool.to_string(), text.to_string()]);
                }
            }
            println!("{table}");
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
