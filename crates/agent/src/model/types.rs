//! Provider-agnostic conversation types.
//!
//! These carry the universal chat-completions concepts; provider-specific
//! wire shapes belong in adapter modules, which normalize into this schema
//! so the orchestrator never inspects variant response shapes.

use super::errors::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier used to correlate the result message.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments as the raw JSON string the provider produced.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument string leniently.
    ///
    /// Malformed JSON, or JSON that is not an object, yields an empty object
    /// rather than an error; the model occasionally emits garbage here and a
    /// single bad call must not abort the turn.
    pub fn parse_arguments(&self) -> Value {
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(value @ Value::Object(_)) => value,
            Ok(other) => {
                tracing::warn!(tool = %self.name, ?other, "non-object tool arguments, using {{}}");
                Value::Object(Map::new())
            }
            Err(e) => {
                tracing::warn!(tool = %self.name, error = %e, "unparseable tool arguments, using {{}}");
                Value::Object(Map::new())
            }
        }
    }
}

/// A message in the conversation, in chat-completions shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool-role messages, the id of the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant message recording the tool calls the model requested.
    pub fn assistant_tool_request(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Tool-role message carrying one execution result.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool definition exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// Everything needed for one model call.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    /// Tools offered for this call; empty means tools are not offered.
    pub tools: &'a [ToolSpec],
}

/// A provider response, normalized by the adapter.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Text content (may be empty when the model only requests tools).
    pub content: String,
    /// Tool calls in the order the provider returned them.
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    /// A plain text response with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Trait for LLM providers.
pub trait Provider: Send + Sync {
    fn complete(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ProviderError>> + Send;
}
