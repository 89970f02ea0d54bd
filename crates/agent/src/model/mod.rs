//! Conversation protocol types and the provider trait.

pub mod errors;
pub mod types;

pub use errors::ProviderError;
pub use types::{Message, ModelRequest, ModelResponse, Provider, Role, ToolCall, ToolSpec};
