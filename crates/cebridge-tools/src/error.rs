use cebridge_relay::RelayError;

/// Errors raised while binding or invoking a tool.
///
/// The command surface never returns these to its caller; they are rendered
/// as `{"success": false, "error": ...}` text.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No tool with this name exists in the catalogue.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A parameter without a default was not supplied.
    #[error("{tool}: missing required parameter '{param}'")]
    MissingParam { tool: String, param: String },

    /// A parameter could not be coerced to its declared type.
    #[error("{tool}: parameter '{param}' expects {expected}, got {got}")]
    InvalidParam {
        tool: String,
        param: String,
        expected: &'static str,
        got: String,
    },

    /// The relay failed after its retry budget.
    #[error(transparent)]
    Relay(#[from] RelayError),
}

pub type Result<T> = std::result::Result<T, ToolError>;
