use serde_json::{json, Map, Number, Value};

use crate::error::{Result, ToolError};

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Bool,
    Str,
    /// Any JSON array, passed through as is.
    List,
}

impl ParamKind {
    /// JSON Schema `type` keyword.
    pub fn json_type(self) -> &'static str {
        match self {
            ParamKind::Int => "integer",
            ParamKind::Bool => "boolean",
            ParamKind::Str => "string",
            ParamKind::List => "array",
        }
    }
}

/// Value used when a parameter is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDefault {
    Required,
    Int(i64),
    Bool(bool),
    Str(&'static str),
}

impl ParamDefault {
    pub fn to_value(self) -> Option<Value> {
        match self {
            ParamDefault::Required => None,
            ParamDefault::Int(n) => Some(Value::from(n)),
            ParamDefault::Bool(b) => Some(Value::Bool(b)),
            ParamDefault::Str(s) => Some(Value::from(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamDefault,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            default: ParamDefault::Required,
        }
    }

    const fn optional(name: &'static str, kind: ParamKind, default: ParamDefault) -> Self {
        Self {
            name,
            kind,
            default,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self.default, ParamDefault::Required)
    }

    /// Coerce a supplied argument (or the default) to the declared kind.
    ///
    /// Lax in the usual direction only: numeric strings become integers,
    /// `"true"`/`"false"` become booleans, numbers become strings.
    pub fn coerce(&self, tool: &str, supplied: Option<&Value>) -> Result<Value> {
        let value = match supplied {
            Some(Value::Null) | None => {
                return self.default.to_value().ok_or_else(|| ToolError::MissingParam {
                    tool: tool.to_string(),
                    param: self.name.to_string(),
                })
            }
            Some(value) => value,
        };

        let coerced = match (self.kind, value) {
            (ParamKind::Int, Value::Number(n)) => as_integer(n),
            (ParamKind::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (ParamKind::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
            (ParamKind::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (ParamKind::Bool, Value::Number(n)) => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            (ParamKind::Str, Value::String(s)) => Some(Value::String(s.clone())),
            (ParamKind::Str, Value::Number(n)) => Some(Value::String(n.to_string())),
            (ParamKind::List, Value::Array(items)) => Some(Value::Array(items.clone())),
            _ => None,
        };

        coerced.ok_or_else(|| ToolError::InvalidParam {
            tool: tool.to_string(),
            param: self.name.to_string(),
            expected: self.kind.json_type(),
            got: value.to_string(),
        })
    }
}

fn as_integer(n: &Number) -> Option<Value> {
    if let Some(i) = n.as_i64() {
        return Some(Value::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Value::from(u));
    }
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15)
        .map(|f| Value::from(f as i64))
}

/// One operation of the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool name; also the method name sent to the instrument.
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    /// Build the request parameters from caller arguments.
    ///
    /// Arguments not declared by the tool are ignored.
    pub fn bind(&self, args: &Map<String, Value>) -> Result<Map<String, Value>> {
        let mut params = Map::new();
        for spec in self.params {
            let value = spec.coerce(self.name, args.get(spec.name))?;
            params.insert(spec.name.to_string(), value);
        }
        Ok(params)
    }

    /// JSON Schema describing the tool's arguments.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in self.params {
            let mut property = Map::new();
            property.insert("type".into(), Value::from(spec.kind.json_type()));
            if let Some(default) = spec.default.to_value() {
                property.insert("default".into(), default);
            }
            properties.insert(spec.name.to_string(), Value::Object(property));
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// `name(a, b=1)` style signature, for listings.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| match p.default.to_value() {
                Some(default) => format!("{}={default}", p.name),
                None => p.name.to_string(),
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

use ParamDefault as D;
use ParamKind as K;

const ADDRESS: ParamSpec = ParamSpec::required("address", K::Str);

/// Every tool exposed to the calling framework.
pub static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "ping",
        description: "Ping the instrument bridge to verify connectivity.",
        params: &[],
    },
    ToolSpec {
        name: "get_version",
        description: "Get the instrument bridge version.",
        params: &[],
    },
    ToolSpec {
        name: "get_process_info",
        description: "Get information about the currently attached process.",
        params: &[],
    },
    ToolSpec {
        name: "list_processes",
        description: "List all running processes.",
        params: &[],
    },
    ToolSpec {
        name: "attach_process",
        description: "Attach to a process by PID.",
        params: &[ParamSpec::required("pid", K::Int)],
    },
    ToolSpec {
        name: "read_memory",
        description: "Read memory at the specified address.",
        params: &[ADDRESS, ParamSpec::optional("size", K::Int, D::Int(16))],
    },
    ToolSpec {
        name: "read_integer",
        description: "Read an integer value from memory.",
        params: &[
            ADDRESS,
            ParamSpec::optional("type_size", K::Int, D::Int(4)),
            ParamSpec::optional("signed", K::Bool, D::Bool(false)),
        ],
    },
    ToolSpec {
        name: "read_string",
        description: "Read a string from memory.",
        params: &[
            ADDRESS,
            ParamSpec::optional("max_length", K::Int, D::Int(256)),
            ParamSpec::optional("encoding", K::Str, D::Str("utf-8")),
        ],
    },
    ToolSpec {
        name: "read_pointer_chain",
        description: "Follow a pointer chain and read the final address.",
        params: &[
            ParamSpec::required("base_address", K::Str),
            ParamSpec::required("offsets", K::List),
        ],
    },
    ToolSpec {
        name: "scan_all",
        description: "Scan for a value in memory.",
        params: &[
            ParamSpec::required("value", K::Str),
            ParamSpec::optional("value_type", K::Str, D::Str("4bytes")),
        ],
    },
    ToolSpec {
        name: "aob_scan",
        description: "Scan for an Array of Bytes pattern.",
        params: &[ParamSpec::required("pattern", K::Str)],
    },
    ToolSpec {
        name: "disassemble",
        description: "Disassemble instructions at the specified address.",
        params: &[ADDRESS, ParamSpec::optional("count", K::Int, D::Int(10))],
    },
    ToolSpec {
        name: "analyze_function",
        description: "Analyze a function at the specified address.",
        params: &[ADDRESS],
    },
    ToolSpec {
        name: "get_rtti_classname",
        description: "Get the RTTI class name at the specified address.",
        params: &[ADDRESS],
    },
    ToolSpec {
        name: "dissect_structure",
        description: "Auto-analyze a structure at the specified address.",
        params: &[ADDRESS, ParamSpec::optional("size", K::Int, D::Int(256))],
    },
    ToolSpec {
        name: "find_references",
        description: "Find references to the specified address.",
        params: &[ADDRESS],
    },
    ToolSpec {
        name: "set_breakpoint",
        description: "Set a breakpoint at the specified address.",
        params: &[ADDRESS],
    },
    ToolSpec {
        name: "remove_breakpoint",
        description: "Remove a breakpoint at the specified address.",
        params: &[ADDRESS],
    },
    ToolSpec {
        name: "get_breakpoint_hits",
        description: "Get all breakpoint hits since last check.",
        params: &[],
    },
    ToolSpec {
        name: "get_module_base",
        description: "Get the base address of a module.",
        params: &[ParamSpec::required("module_name", K::Str)],
    },
    ToolSpec {
        name: "write_memory",
        description: "Write data to memory.",
        params: &[
            ADDRESS,
            ParamSpec::required("data", K::Str),
            ParamSpec::optional("data_type", K::Str, D::Str("bytes")),
        ],
    },
];

/// Look up a tool by name.
pub fn find(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|tool| tool.name == name)
}

/// Look up a tool by name, failing with [`ToolError::UnknownTool`].
pub fn lookup(name: &str) -> Result<&'static ToolSpec> {
    find(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))
}

/// The whole catalogue as `[{name, description, inputSchema}]`.
pub fn catalog_json() -> Value {
    Value::Array(
        TOOLS
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema(),
                })
            })
            .collect(),
    )
}
