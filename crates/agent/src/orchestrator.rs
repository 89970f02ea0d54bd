//! The tool-calling conversation loop.
//!
//! One turn: build the prompt, call the model with the tool registry,
//! execute any requested tools sequentially, call the model once more to
//! summarize, and always hand back a reply. Every failure along the way is
//! converted into readable text; the caller never sees an error.

use serde_json::Value;

use crate::model::{Message, ModelRequest, Provider, ProviderError};
use crate::session::SessionStore;
use crate::tools::{Credentials, ToolHost, ToolOutcome};

/// Fixed tool-usage guidance prepended to every conversation.
const TOOL_GUIDANCE: &str = "你是WanderAI，一个专业的旅行规划助手。你可以使用以下工具获取实时信息：

可用工具：
1. search_poi - 搜索地点（如：故宫、西湖、外滩）
2. search_nearby - 搜索周边设施（如：附近的酒店、停车场、餐厅）
3. search_knowledge_base - 获取旅行技巧（如：避坑指南、省钱技巧、隐藏景点）

使用指南：
- 当用户询问具体地点时，使用 search_poi
- 当用户需要周边服务时，使用 search_nearby
- 当用户询问建议技巧时，使用 search_knowledge_base
- 主动询问细节以提供更好建议

回复风格：
- 热情、专业、贴心
- 使用emoji增强表达
- 提供具体、可行的建议
- 根据上下文保持对话连贯性";

/// Recorded as the assistant's text when it requests tools. Partial content
/// alongside tool calls is never shown as an answer.
const QUERYING_PLACEHOLDER: &str = "正在为您查询信息...";

/// Reply when the model returns neither text nor tool calls.
const EMPTY_REPLY_FALLBACK: &str = "我可以帮您规划旅行、推荐景点、估算预算。请告诉我您的具体需求！";

/// Advisory shown when no LLM credential is configured.
const NO_KEY_ADVISORY: &str = "未检测到 DashScope API Key。

要使用完整的AI对话功能，请前往系统设置配置您的API Key。

目前您可以：
✅ 查看预设旅行建议
✅ 使用手动规划功能
✅ 进行预算计算";

/// The result of one conversation turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Final reply text; never empty.
    pub reply_text: String,
    /// Whether any tool was dispatched during the turn.
    pub used_tools: bool,
}

/// Drives turns against a provider and a tool host.
pub struct Orchestrator<P, T> {
    provider: P,
    tools: T,
    sessions: SessionStore,
    extra_system: Option<String>,
}

impl<P: Provider, T: ToolHost> Orchestrator<P, T> {
    pub fn new(provider: P, tools: T) -> Self {
        Self {
            provider,
            tools,
            sessions: SessionStore::new(),
            extra_system: None,
        }
    }

    /// Append caller-supplied system content after the fixed guidance.
    pub fn with_system(mut self, extra: impl Into<String>) -> Self {
        self.extra_system = Some(extra.into());
        self
    }

    /// The per-session history store (for eviction by the caller).
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run one conversation turn. Always returns a non-empty reply.
    pub async fn run_turn(
        &self,
        user_message: &str,
        session_id: &str,
        credentials: &Credentials,
    ) -> TurnResult {
        let mut messages = vec![Message::system(self.system_prompt())];
        messages.extend(self.sessions.history(session_id));
        messages.push(Message::user(user_message));

        let first = match self
            .provider
            .complete(ModelRequest {
                messages: &messages,
                tools: self.tools.specs(),
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "first model call failed");
                let reply = advisory_reply(&e);
                self.sessions.append_turn(session_id, user_message, &reply);
                return TurnResult {
                    reply_text: reply,
                    used_tools: false,
                };
            }
        };

        if first.tool_calls.is_empty() {
            let reply = if first.content.trim().is_empty() {
                EMPTY_REPLY_FALLBACK.to_string()
            } else {
                first.content
            };
            self.sessions.append_turn(session_id, user_message, &reply);
            return TurnResult {
                reply_text: reply,
                used_tools: false,
            };
        }

        tracing::info!(count = first.tool_calls.len(), "model requested tools");
        messages.push(Message::assistant_tool_request(
            QUERYING_PLACEHOLDER,
            first.tool_calls.clone(),
        ));

        // Sequential dispatch, in provider order: result ordering stays
        // deterministic and the external APIs see no burst.
        let mut outcomes = Vec::with_capacity(first.tool_calls.len());
        for call in &first.tool_calls {
            let args = call.parse_arguments();
            let outcome = self.tools.dispatch(&call.name, &args, credentials).await;
            messages.push(Message::tool_result(
                call.id.clone(),
                outcome.to_message_json().to_string(),
            ));
            outcomes.push(outcome);
        }

        // Second call summarizes the tool results; tools are not re-offered,
        // one round per turn.
        let reply = match self
            .provider
            .complete(ModelRequest {
                messages: &messages,
                tools: &[],
            })
            .await
        {
            Ok(second) if !second.content.trim().is_empty() => second.content,
            Ok(_) => summarize_outcomes(&outcomes),
            Err(e) => {
                tracing::warn!(error = %e, "second model call failed, synthesizing summary");
                summarize_outcomes(&outcomes)
            }
        };

        self.sessions.append_turn(session_id, user_message, &reply);
        TurnResult {
            reply_text: reply,
            used_tools: true,
        }
    }

    fn system_prompt(&self) -> String {
        match &self.extra_system {
            Some(extra) => format!("{TOOL_GUIDANCE}\n\n{extra}"),
            None => TOOL_GUIDANCE.to_string(),
        }
    }
}

/// User-facing advisory for a failed first call. Static text, no raw errors.
fn advisory_reply(error: &ProviderError) -> String {
    match error {
        ProviderError::CredentialMissing => NO_KEY_ADVISORY.to_string(),
        other => {
            let detail: String = other.to_string().chars().take(100).collect();
            format!(
                "抱歉，AI服务暂时遇到问题。\n\n错误信息: {detail}\n\n您可以：\n1. 检查API Key配置\n2. 稍后再试\n3. 使用手动规划功能"
            )
        }
    }
}

/// Degraded reply built directly from tool outcomes when the summary call
/// fails. One line per outcome, plus a couple of detail bullets.
fn summarize_outcomes(outcomes: &[ToolOutcome]) -> String {
    let mut summary = String::from("已为您查询到以下信息：\n\n");

    for (i, outcome) in outcomes.iter().enumerate() {
        let index = i + 1;
        if outcome.success {
            if let Some(line) = outcome.payload.get("summary").and_then(Value::as_str) {
                summary.push_str(&format!("{index}. {line}\n"));
            }
            if let Some(pois) = outcome.payload.get("pois").and_then(Value::as_array) {
                for poi in pois.iter().take(2) {
                    let name = poi.get("name").and_then(Value::as_str).unwrap_or("未知");
                    summary.push_str(&format!("   • {name}"));
                    if let Some(address) = poi.get("address").and_then(Value::as_str) {
                        if !address.is_empty() {
                            summary.push_str(&format!(" - {address}"));
                        }
                    }
                    summary.push('\n');
                }
            }
            if let Some(documents) = outcome.payload.get("documents").and_then(Value::as_array) {
                for doc in documents.iter().take(2) {
                    if let Some(text) = doc.as_str() {
                        let snippet: String = text.chars().take(60).collect();
                        summary.push_str(&format!("   • {snippet}\n"));
                    }
                }
            }
        } else {
            let error = outcome.error.as_deref().unwrap_or("未知错误");
            summary.push_str(&format!("{index}. 查询失败：{error}\n"));
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelResponse, ToolCall, ToolSpec};
    use crate::tools::builtin_specs;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that replays scripted responses and records each request's
    /// message list.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<ModelResponse, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Provider for ScriptedProvider {
        async fn complete(
            &self,
            request: ModelRequest<'_>,
        ) -> Result<ModelResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())))
        }
    }

    /// Tool host that replays scripted outcomes and records dispatches.
    struct ScriptedHost {
        specs: Vec<ToolSpec>,
        outcomes: Mutex<VecDeque<ToolOutcome>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedHost {
        fn new(outcomes: Vec<ToolOutcome>) -> Self {
            Self {
                specs: builtin_specs(),
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolHost for ScriptedHost {
        fn specs(&self) -> &[ToolSpec] {
            &self.specs
        }

        async fn dispatch(
            &self,
            name: &str,
            args: &Value,
            _credentials: &Credentials,
        ) -> ToolOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), args.clone()));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ToolOutcome::fail("no scripted outcome"))
        }
    }

    fn tool_request(calls: Vec<ToolCall>) -> ModelResponse {
        ModelResponse {
            content: String::new(),
            tool_calls: calls,
        }
    }

    #[tokio::test]
    async fn plain_response_is_returned_verbatim() {
        let provider = ScriptedProvider::new(vec![Ok(ModelResponse::text("北京三日游建议如下。"))]);
        let orchestrator = Orchestrator::new(provider, ScriptedHost::new(vec![]));

        let result = orchestrator
            .run_turn("帮我规划北京三日游", "s1", &Credentials::default())
            .await;

        assert_eq!(result.reply_text, "北京三日游建议如下。");
        assert!(!result.used_tools);
    }

    #[tokio::test]
    async fn tool_calls_dispatch_in_order_with_matching_ids() {
        let calls = vec![
            ToolCall::new("id_a", "search_poi", r#"{"keywords":"故宫"}"#),
            ToolCall::new("id_b", "search_knowledge_base", r#"{"query":"避坑"}"#),
        ];
        let provider = ScriptedProvider::new(vec![
            Ok(ModelResponse {
                content: "让我查一下".into(),
                tool_calls: calls,
            }),
            Ok(ModelResponse::text("查询完成。")),
        ]);
        let host = ScriptedHost::new(vec![
            ToolOutcome::ok(json!({"success": true, "count": 1})),
            ToolOutcome::ok(json!({"success": true, "documents": []})),
        ]);
        let orchestrator = Orchestrator::new(provider, host);

        let result = orchestrator
            .run_turn("故宫怎么玩", "s1", &Credentials::default())
            .await;

        assert_eq!(result.reply_text, "查询完成。");
        assert!(result.used_tools);

        let calls = orchestrator.tools.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "search_poi");
        assert_eq!(calls[1].0, "search_knowledge_base");

        // Second request: system, user, assistant tool request, two tool
        // results whose ids line up with the original calls in order.
        let requests = orchestrator.provider.requests();
        assert_eq!(requests.len(), 2);
        let followup = &requests[1];
        let assistant = &followup[followup.len() - 3];
        // Partial content is replaced by the placeholder acknowledgment.
        assert_eq!(assistant.content, QUERYING_PLACEHOLDER);
        assert_eq!(assistant.tool_calls.len(), 2);
        let tool_messages: Vec<_> = followup
            .iter()
            .filter(|m| m.tool_call_id.is_some())
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("id_a"));
        assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("id_b"));
    }

    #[tokio::test]
    async fn garbled_arguments_dispatch_as_empty_object() {
        let provider = ScriptedProvider::new(vec![
            Ok(tool_request(vec![ToolCall::new(
                "c0",
                "search_poi",
                "{bad json",
            )])),
            Ok(ModelResponse::text("好的。")),
        ]);
        let host = ScriptedHost::new(vec![ToolOutcome::fail("missing required argument: keywords")]);
        let orchestrator = Orchestrator::new(provider, host);

        let result = orchestrator
            .run_turn("随便查查", "s1", &Credentials::default())
            .await;

        assert!(!result.reply_text.is_empty());
        let calls = orchestrator.tools.calls();
        assert_eq!(calls[0].1, json!({}));
    }

    #[tokio::test]
    async fn single_tool_failure_does_not_fail_the_turn() {
        let provider = ScriptedProvider::new(vec![
            Ok(tool_request(vec![
                ToolCall::new("c0", "search_poi", "{}"),
                ToolCall::new("c1", "search_knowledge_base", r#"{"query":"q"}"#),
            ])),
            Ok(ModelResponse::text("部分结果如下。")),
        ]);
        let host = ScriptedHost::new(vec![
            ToolOutcome::fail("credential missing"),
            ToolOutcome::ok(json!({"success": true, "documents": ["tip"]})),
        ]);
        let orchestrator = Orchestrator::new(provider, host);

        let result = orchestrator
            .run_turn("查询", "s1", &Credentials::default())
            .await;

        assert_eq!(result.reply_text, "部分结果如下。");
        assert_eq!(orchestrator.tools.calls().len(), 2);
    }

    #[tokio::test]
    async fn first_call_failure_yields_advisory() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Api {
            status: 429,
            message: "Throttling".into(),
        })]);
        let orchestrator = Orchestrator::new(provider, ScriptedHost::new(vec![]));

        let result = orchestrator
            .run_turn("你好", "s1", &Credentials::default())
            .await;

        assert!(result.reply_text.contains("AI服务暂时遇到问题"));
        assert!(!result.used_tools);
        assert!(orchestrator.tools.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_yields_key_advisory() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::CredentialMissing)]);
        let orchestrator = Orchestrator::new(provider, ScriptedHost::new(vec![]));

        let result = orchestrator
            .run_turn("你好", "s1", &Credentials::default())
            .await;

        assert!(result.reply_text.contains("DashScope API Key"));
    }

    #[tokio::test]
    async fn second_call_failure_synthesizes_summary() {
        let provider = ScriptedProvider::new(vec![
            Ok(tool_request(vec![ToolCall::new(
                "c0",
                "search_nearby",
                r#"{"location":"116.39,39.90","keywords":"停车场"}"#,
            )])),
            Err(ProviderError::Network("timeout".into())),
        ]);
        let host = ScriptedHost::new(vec![ToolOutcome::ok(json!({
            "success": true,
            "count": 2,
            "pois": [
                {"name": "地下停车场", "address": "东华门附近"},
                {"name": "路侧停车位", "address": ""},
            ],
            "summary": "找到2个附近设施",
        }))]);
        let orchestrator = Orchestrator::new(provider, host);

        let result = orchestrator
            .run_turn("附近停车", "s1", &Credentials::default())
            .await;

        assert!(result.used_tools);
        assert!(result.reply_text.starts_with("已为您查询到以下信息"));
        assert!(result.reply_text.contains("找到2个附近设施"));
        assert!(result.reply_text.contains("地下停车场 - 东华门附近"));
    }

    #[tokio::test]
    async fn failed_tools_plus_failed_summary_still_reply() {
        // Missing map credential and a dead provider on the second call:
        // the turn still completes with readable text.
        let provider = ScriptedProvider::new(vec![
            Ok(tool_request(vec![ToolCall::new(
                "c0",
                "search_nearby",
                r#"{"location":"1,2","keywords":"酒店"}"#,
            )])),
            Err(ProviderError::Api {
                status: 500,
                message: "down".into(),
            }),
        ]);
        let host = ScriptedHost::new(vec![ToolOutcome::fail("credential missing")]);
        let orchestrator = Orchestrator::new(provider, host);

        let result = orchestrator
            .run_turn("附近酒店", "s1", &Credentials::default())
            .await;

        assert!(!result.reply_text.is_empty());
        assert!(result.reply_text.contains("查询失败：credential missing"));
    }

    #[tokio::test]
    async fn forbidden_city_scenario() {
        // End-to-end: the model asks for search_poi("故宫"), the tool returns
        // two POIs, and the second call's reply is the final text verbatim.
        let provider = ScriptedProvider::new(vec![
            Ok(tool_request(vec![ToolCall::new(
                "call_0",
                "search_poi",
                r#"{"keywords":"故宫"}"#,
            )])),
            Ok(ModelResponse::text("故宫位于景山前街4号，建议提前购票。")),
        ]);
        let host = ScriptedHost::new(vec![ToolOutcome::ok(json!({
            "success": true,
            "count": 2,
            "pois": [
                {"name": "故宫博物院", "address": "景山前街4号"},
                {"name": "故宫角楼", "address": ""},
            ],
            "summary": "找到2个相关地点",
        }))]);
        let orchestrator = Orchestrator::new(provider, host);

        let result = orchestrator
            .run_turn("帮我查一下故宫", "s1", &Credentials::default())
            .await;

        assert_eq!(result.reply_text, "故宫位于景山前街4号，建议提前购票。");

        let requests = orchestrator.provider.requests();
        let tool_message = requests[1]
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("call_0"))
            .unwrap();
        let payload: Value = serde_json::from_str(&tool_message.content).unwrap();
        assert_eq!(payload["count"], 2);
    }

    #[tokio::test]
    async fn empty_response_gets_canned_reply() {
        let provider = ScriptedProvider::new(vec![Ok(ModelResponse::text("  "))]);
        let orchestrator = Orchestrator::new(provider, ScriptedHost::new(vec![]));

        let result = orchestrator
            .run_turn("……", "s1", &Credentials::default())
            .await;

        assert_eq!(result.reply_text, EMPTY_REPLY_FALLBACK);
    }

    #[tokio::test]
    async fn history_flows_into_the_next_turn() {
        let provider = ScriptedProvider::new(vec![
            Ok(ModelResponse::text("第一轮回复")),
            Ok(ModelResponse::text("第二轮回复")),
        ]);
        let orchestrator = Orchestrator::new(provider, ScriptedHost::new(vec![]));

        orchestrator
            .run_turn("第一问", "s1", &Credentials::default())
            .await;
        orchestrator
            .run_turn("第二问", "s1", &Credentials::default())
            .await;

        let requests = orchestrator.provider.requests();
        // system + prior user/assistant pair + new user message
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][1].content, "第一问");
        assert_eq!(requests[1][2].content, "第一轮回复");
    }

    #[tokio::test]
    async fn caller_system_content_is_appended_not_replacing() {
        let provider = ScriptedProvider::new(vec![Ok(ModelResponse::text("ok"))]);
        let orchestrator =
            Orchestrator::new(provider, ScriptedHost::new(vec![])).with_system("用户是摄影爱好者。");

        orchestrator
            .run_turn("hi", "s1", &Credentials::default())
            .await;

        let system = &orchestrator.provider.requests()[0][0];
        assert!(system.content.starts_with("你是WanderAI"));
        assert!(system.content.ends_with("用户是摄影爱好者。"));
    }

    #[tokio::test]
    async fn replies_are_never_empty_under_random_garbage() {
        // Sweep garbled argument payloads and provider failure modes; the
        // turn must always produce text.
        let garbage_args = ["{bad json", "", "[]", "null", "42", "\"str\"", "{\"x\":}"];
        for (i, args) in garbage_args.iter().enumerate() {
            let provider = ScriptedProvider::new(vec![
                Ok(tool_request(vec![ToolCall::new("c", "search_poi", *args)])),
                if i % 2 == 0 {
                    Err(ProviderError::Network("down".into()))
                } else {
                    Ok(ModelResponse::text(""))
                },
            ]);
            let host = ScriptedHost::new(vec![ToolOutcome::fail("boom")]);
            let orchestrator = Orchestrator::new(provider, host);
            let result = orchestrator
                .run_turn("q", &format!("s{i}"), &Credentials::default())
                .await;
            assert!(!result.reply_text.is_empty(), "case {i} produced empty reply");
        }
    }
}
