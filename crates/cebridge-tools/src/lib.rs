//! The command surface: a fixed catalogue of instrument operations.
//!
//! Each tool is a pure pass-through to [`cebridge_relay::RelayClient::call`].
//! Results come back as structured JSON text; failures never escape as
//! errors.

pub mod catalog;
pub mod error;
pub mod format;
pub mod surface;

pub use catalog::{
    catalog_json, find, lookup, ParamDefault, ParamKind, ParamSpec, ToolSpec, TOOLS,
};
pub use error::{Result, ToolError};
pub use format::{format_failure, format_value, is_failure};
pub use surface::{CommandSurface, CommandTransport};
