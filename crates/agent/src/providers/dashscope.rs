//! DashScope (Qwen) provider adapter.
//!
//! Normalizes the DashScope generation API into [`ModelResponse`]. All
//! response-shape quirks are handled here: content that arrives as a block
//! array, tool calls with missing ids, error envelopes inside non-success
//! bodies. The orchestrator only ever sees the normalized schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::model::{
    Message, ModelRequest, ModelResponse, Provider, ProviderError, Role, ToolCall, ToolSpec,
};

const DASHSCOPE_GENERATION_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";

/// Default chat model. Turbo keeps per-turn cost low.
pub const QWEN_TURBO: &str = "qwen-turbo";
/// Larger model used for one-shot itinerary generation.
pub const QWEN_MAX: &str = "qwen-max";

const DEFAULT_MAX_TOKENS: u32 = 2000;
const DEFAULT_TEMPERATURE: f32 = 0.8;
const DEFAULT_TOP_P: f32 = 0.8;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for a DashScope provider.
#[derive(Debug, Clone)]
pub struct DashScopeProviderBuilder {
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl DashScopeProviderBuilder {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build(self) -> DashScopeProvider {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        DashScopeProvider {
            http,
            api_key: self.api_key,
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

/// DashScope generation API client.
pub struct DashScopeProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl DashScopeProvider {
    /// Builder with the default chat model.
    pub fn builder(api_key: Option<String>) -> DashScopeProviderBuilder {
        DashScopeProviderBuilder::new(api_key, QWEN_TURBO)
    }

    /// Builder with an explicit model.
    pub fn builder_for(api_key: Option<String>, model: impl Into<String>) -> DashScopeProviderBuilder {
        DashScopeProviderBuilder::new(api_key, model)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: ApiInput,
    parameters: ApiParameters,
}

#[derive(Debug, Serialize)]
struct ApiInput {
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiParameters {
    result_format: &'static str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    output: ApiOutput,
}

#[derive(Debug, Deserialize)]
struct ApiOutput {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiOutMessage,
}

#[derive(Debug, Deserialize)]
struct ApiOutMessage {
    #[serde(default)]
    content: Value,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default)]
    function: ApiFunction,
}

#[derive(Debug, Default, Deserialize)]
struct ApiFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Error envelope DashScope returns alongside non-success statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalization
// ─────────────────────────────────────────────────────────────────────────────

fn role_to_api(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn message_to_api(msg: &Message) -> ApiMessage {
    let tool_calls = msg
        .tool_calls
        .iter()
        .map(|call| {
            json!({
                "id": call.id,
                "type": "function",
                "function": {
                    "name": call.name,
                    "arguments": call.arguments,
                },
            })
        })
        .collect();

    ApiMessage {
        role: role_to_api(msg.role),
        content: msg.content.clone(),
        tool_calls,
        tool_call_id: msg.tool_call_id.clone(),
    }
}

fn tool_to_api(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters,
        },
    })
}

/// Flatten message content into plain text.
///
/// Qwen usually returns a string, but some model variants emit an array of
/// `{"text": ...}` blocks.
fn normalize_content(content: Value) -> String {
    match content {
        Value::String(text) => text,
        Value::Array(blocks) => blocks
            .into_iter()
            .filter_map(|block| {
                block
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

/// Convert wire tool calls, assigning `call_{i}` ids when absent.
fn normalize_tool_calls(calls: Vec<ApiToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .enumerate()
        .map(|(i, call)| {
            let id = if call.id.is_empty() {
                format!("call_{i}")
            } else {
                call.id
            };
            ToolCall::new(id, call.function.name, call.function.arguments)
        })
        .collect()
}

impl Provider for DashScopeProvider {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderError::CredentialMissing);
        };

        let api_request = ApiRequest {
            model: &self.model,
            input: ApiInput {
                messages: request.messages.iter().map(message_to_api).collect(),
            },
            parameters: ApiParameters {
                result_format: "message",
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                top_p: self.top_p,
                tools: request.tools.iter().map(tool_to_api).collect(),
            },
        };

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "dashscope generation call"
        );

        let response = self
            .http
            .post(DASHSCOPE_GENERATION_URL)
            .bearer_auth(api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) if !err.code.is_empty() => format!("{}: {}", err.code, err.message),
                _ => body,
            };
            return Err(ProviderError::Api { status, message });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let choice = api_response
            .output
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in output".to_string()))?;

        Ok(ModelResponse {
            content: normalize_content(choice.message.content),
            tool_calls: normalize_tool_calls(choice.message.tool_calls),
        })
    }
}
