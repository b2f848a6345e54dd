//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

use hostcall_protocol::PROTOCOL_VERSION;

use crate::structure::ErrorPolicy;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Wire protocol version (default: 1)
    pub protocol_version: i32,

    /// Collection for calls that name none (default: "", the library list)
    pub default_collection: String,

    /// Error-code template inserted by manifests (default: capture)
    pub error_policy: ErrorPolicy,

    /// Transport command (default: none configured)
    pub transport_command: String,

    /// Log filter when RUST_LOG is unset (default: "warn")
    pub log_level: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            default_collection: String::new(),
            error_policy: ErrorPolicy::Capture,
            transport_command: String::new(),
            log_level: "warn".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "protocol_version": self.protocol_version,
            "default_collection": self.default_collection,
            "error_policy": self.error_policy,
            "transport": {
                "command": self.transport_command,
                "args": []
            },
            "log_level": self.log_level
        })
    }
}
