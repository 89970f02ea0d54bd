//! Tool execution outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Sentinel error for a tool name outside the registered set.
pub const ERR_UNSUPPORTED_TOOL: &str = "unsupported tool";
/// Sentinel error for an external call whose credential is not configured.
pub const ERR_CREDENTIAL_MISSING: &str = "credential missing";

/// The outcome of executing one tool call.
///
/// Always produced, even on failure; dispatch errors are captured here as
/// data and never propagate as faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    /// Result payload fed back to the model (null on failure).
    pub payload: Value,
    pub error: Option<String>,
}

impl ToolOutcome {
    /// A successful outcome with the given payload.
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    /// A failed outcome with a readable error message.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            error: Some(error.into()),
        }
    }

    /// The JSON placed into the tool-role message content.
    pub fn to_message_json(&self) -> Value {
        if self.success {
            self.payload.clone()
        } else {
            json!({ "error": self.error.as_deref().unwrap_or("工具执行失败") })
        }
    }
}
