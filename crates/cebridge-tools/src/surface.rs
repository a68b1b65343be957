use cebridge_relay::{RelayClient, SharedRelayClient};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::catalog::lookup;
use crate::format::{format_failure, format_value};

/// Something that can carry a method call to the instrument.
pub trait CommandTransport {
    fn call(&mut self, method: &str, params: Map<String, Value>) -> cebridge_relay::Result<Value>;
}

impl CommandTransport for RelayClient {
    fn call(&mut self, method: &str, params: Map<String, Value>) -> cebridge_relay::Result<Value> {
        RelayClient::call(self, method, params)
    }
}

impl CommandTransport for SharedRelayClient {
    fn call(&mut self, method: &str, params: Map<String, Value>) -> cebridge_relay::Result<Value> {
        SharedRelayClient::call(self, method, params)
    }
}

impl<T: CommandTransport + ?Sized> CommandTransport for &mut T {
    fn call(&mut self, method: &str, params: Map<String, Value>) -> cebridge_relay::Result<Value> {
        (**self).call(method, params)
    }
}

/// The fixed set of operations offered to the calling framework.
///
/// Every operation returns structured text and never fails: relay errors
/// become `{"success": false, "error": ...}`.
pub struct CommandSurface<T> {
    transport: T,
}

impl<T: CommandTransport> CommandSurface<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Invoke a tool by name with loosely typed arguments.
    pub fn dispatch(&mut self, name: &str, args: &Map<String, Value>) -> String {
        let bound = lookup(name).and_then(|tool| Ok((tool.name, tool.bind(args)?)));
        match bound {
            Ok((method, params)) => self.invoke(method, params),
            Err(e) => {
                debug!(tool = name, error = %e, "rejected tool call");
                format_failure(e)
            }
        }
    }

    /// Send `method` as is and format the outcome.
    pub fn invoke(&mut self, method: &str, params: Map<String, Value>) -> String {
        match self.transport.call(method, params) {
            Ok(value) => format_value(&value),
            Err(e) => {
                warn!(method, error = %e, "tool call failed");
                format_failure(e)
            }
        }
    }

    pub fn ping(&mut self) -> String {
        self.invoke("ping", Map::new())
    }

    pub fn get_version(&mut self) -> String {
        self.invoke("get_version", Map::new())
    }

    pub fn get_process_info(&mut self) -> String {
        self.invoke("get_process_info", Map::new())
    }

    pub fn list_processes(&mut self) -> String {
        self.invoke("list_processes", Map::new())
    }

    pub fn attach_process(&mut self, pid: i64) -> String {
        self.invoke("attach_process", params(json!({ "pid": pid })))
    }

    pub fn read_memory(&mut self, address: &str, size: i64) -> String {
        self.invoke(
            "read_memory",
            params(json!({ "address": address, "size": size })),
        )
    }

    pub fn read_integer(&mut self, address: &str, type_size: i64, signed: bool) -> String {
        self.invoke(
            "read_integer",
            params(json!({ "address": address, "type_size": type_size, "signed": signed })),
        )
    }

    pub fn read_string(&mut self, address: &str, max_length: i64, encoding: &str) -> String {
        self.invoke(
            "read_string",
            params(json!({ "address": address, "max_length": max_length, "encoding": encoding })),
        )
    }

    pub fn read_pointer_chain(&mut self, base_address: &str, offsets: &[i64]) -> String {
        self.invoke(
            "read_pointer_chain",
            params(json!({ "base_address": base_address, "offsets": offsets })),
        )
    }

    pub fn scan_all(&mut self, value: &str, value_type: &str) -> String {
        self.invoke(
            "scan_all",
            params(json!({ "value": value, "value_type": value_type })),
        )
    }

    pub fn aob_scan(&mut self, pattern: &str) -> String {
        self.invoke("aob_scan", params(json!({ "pattern": pattern })))
    }

    pub fn disassemble(&mut self, address: &str, count: i64) -> String {
        self.invoke(
            "disassemble",
            params(json!({ "address": address, "count": count })),
        )
    }

    pub fn analyze_function(&mut self, address: &str) -> String {
        self.invoke("analyze_function", address_only(address))
    }

    pub fn get_rtti_classname(&mut self, address: &str) -> String {
        self.invoke("get_rtti_classname", address_only(address))
    }

    pub fn dissect_structure(&mut self, address: &str, size: i64) -> String {
        self.invoke(
            "dissect_structure",
            params(json!({ "address": address, "size": size })),
        )
    }

    pub fn find_references(&mut self, address: &str) -> String {
        self.invoke("find_references", address_only(address))
    }

    pub fn set_breakpoint(&mut self, address: &str) -> String {
        self.invoke("set_breakpoint", address_only(address))
    }

    pub fn remove_breakpoint(&mut self, address: &str) -> String {
        self.invoke("remove_breakpoint", address_only(address))
    }

    pub fn get_breakpoint_hits(&mut self) -> String {
        self.invoke("get_breakpoint_hits", Map::new())
    }

    pub fn get_module_base(&mut self, module_name: &str) -> String {
        self.invoke(
            "get_module_base",
            params(json!({ "module_name": module_name })),
        )
    }

    pub fn write_memory(&mut self, address: &str, data: &str, data_type: &str) -> String {
        self.invoke(
            "write_memory",
            params(json!({ "address": address, "data": data, "data_type": data_type })),
        )
    }
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn address_only(address: &str) -> Map<String, Value> {
    params(json!({ "address": address }))
}
