//! One-shot itinerary generation.
//!
//! Builds a planner prompt from the trip parameters, augments it with
//! knowledge-base passages for the destination (lookup failure is
//! non-fatal), and makes a single model call. Like the chat loop this is
//! fail-soft: any provider failure produces a static markdown plan with a
//! budget estimate instead of an error.

use knowledge::{Embedder, KnowledgeBase};

use crate::model::{Message, ModelRequest, Provider};

/// Knowledge passages pulled into the plan prompt.
const RAG_LIMIT: usize = 3;
/// Passage snippet length in the prompt, in characters.
const RAG_SNIPPET_CHARS: usize = 200;

// Per-person per-day budget baseline (yuan) used by the fallback plan.
const LODGING_PER_DAY: u32 = 300;
const TRANSPORT_PER_DAY: u32 = 150;
const FOOD_PER_DAY: u32 = 200;
const TICKETS_PER_DAY: u32 = 100;

/// Parameters for a full trip plan.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub origin: String,
    pub destination: String,
    pub days: u32,
    pub people: u32,
    /// Free-form extra requirements.
    pub preferences: String,
    /// Budget level: 经济 / 适中 / 豪华.
    pub budget: String,
    pub transport: String,
    /// Trip pace: 轻松 / 适中 / 紧凑.
    pub pace: String,
    /// Who the user travels with (朋友、家人、情侣…).
    pub who_with: String,
    /// Interest tags (美食、历史、自然…).
    pub tags: Vec<String>,
}

impl PlanRequest {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        days: u32,
        people: u32,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            days,
            people,
            preferences: "无特殊偏好".to_string(),
            budget: "适中".to_string(),
            transport: "公共交通".to_string(),
            pace: "适中".to_string(),
            who_with: "朋友".to_string(),
            tags: Vec::new(),
        }
    }

    fn tags_str(&self) -> String {
        if self.tags.is_empty() {
            "无".to_string()
        } else {
            self.tags.join(", ")
        }
    }
}

/// Generate a full travel plan. Never fails; provider errors degrade to the
/// static fallback plan.
pub async fn generate_plan<P, E>(
    provider: &P,
    knowledge: Option<&KnowledgeBase<E>>,
    request: &PlanRequest,
) -> String
where
    P: Provider,
    E: Embedder,
{
    let rag_context = lookup_context(knowledge, &request.destination).await;

    let system = plan_prompt(request, rag_context.as_deref());
    let messages = [Message::system(system), Message::user("请开始生成攻略。")];

    match provider
        .complete(ModelRequest {
            messages: &messages,
            tools: &[],
        })
        .await
    {
        Ok(response) if !response.content.trim().is_empty() => response.content,
        Ok(_) => fallback_plan(request, rag_context.as_deref()),
        Err(e) => {
            tracing::warn!(error = %e, "plan generation failed, using fallback");
            fallback_plan(request, rag_context.as_deref())
        }
    }
}

async fn lookup_context<E: Embedder>(
    knowledge: Option<&KnowledgeBase<E>>,
    destination: &str,
) -> Option<String> {
    let kb = knowledge?;
    let query = format!("{destination} 旅游 攻略 避坑");
    match kb.search(&query, RAG_LIMIT).await {
        Ok(docs) if !docs.is_empty() => {
            let lines: Vec<String> = docs
                .iter()
                .map(|doc| {
                    let snippet: String = doc.chars().take(RAG_SNIPPET_CHARS).collect();
                    format!("- {snippet}...")
                })
                .collect();
            Some(format!(
                "**参考的独家知识库信息**:\n{}",
                lines.join("\n")
            ))
        }
        Ok(_) => None,
        Err(e) => {
            // Knowledge lookup is an enhancement, never a blocker.
            tracing::warn!(error = %e, "knowledge lookup for plan failed");
            None
        }
    }
}

fn plan_prompt(request: &PlanRequest, rag_context: Option<&str>) -> String {
    let tags_str = request.tags_str();
    let knowledge_section = rag_context
        .map(str::to_string)
        .unwrap_or_else(|| "**本地知识库**: 暂无相关信息，请基于您的专业知识生成计划。".to_string());

    format!(
        "你是一位金牌旅游规划师。请根据以下详细信息，为用户生成一份高度定制化、专业的旅游攻略文档。

**基本信息**:
- 出发地: {origin}
- 目的地: {destination}
- 时间: {days}天
- 人数: {people}人 ({who_with}出行)

**偏好设置**:
- 预算水平: {budget}
- 出行方式: {transport}
- 游玩节奏: {pace}
- 兴趣标签: {tags_str}
- 其他要求: {preferences}

{knowledge_section}

**输出要求**:
1. **格式**: 使用标准 Markdown 格式。
2. **结构**:
   - **标题**: {destination} {days}日{pace}游攻略 ({who_with}版)
   - **行程亮点**: 根据兴趣标签 ({tags_str}) 提炼的必体验项目。
   - **行前准备**: 针对{who_with}出行的特别准备。
   - **每日行程**: 按 Day 1... 结构。
     - 必须严格遵守【{pace}】的节奏。
     - 餐饮推荐需符合【{budget}】预算定位。
     - 交通方案需匹配【{transport}】。
     - 请使用 Markdown 表格展示每日的时间安排。
   - **交通指南**: 重点介绍{transport}方案。
   - **预算预估**: 根据{budget}标准给出明细。
   - **避坑指南/温馨提示** (请参考独家知识库信息)。
3. **风格**: 实用、贴心、图文并茂（用emoji代替图片）。
4. **内容**: 必须具体到景点名称。

请直接输出 Markdown 内容。",
        origin = request.origin,
        destination = request.destination,
        days = request.days,
        people = request.people,
        who_with = request.who_with,
        budget = request.budget,
        transport = request.transport,
        pace = request.pace,
        preferences = request.preferences,
    )
}

/// Static plan used when the model is unavailable.
fn fallback_plan(request: &PlanRequest, rag_context: Option<&str>) -> String {
    let person_days = request.days * request.people;
    let lodging = LODGING_PER_DAY * person_days;
    let transport = TRANSPORT_PER_DAY * person_days;
    let food = FOOD_PER_DAY * person_days;
    let tickets = TICKETS_PER_DAY * person_days;
    let total = lodging + transport + food + tickets;

    let knowledge_section = rag_context
        .map(str::to_string)
        .unwrap_or_else(|| "基于AI生成的个性化行程".to_string());

    format!(
        "# {destination} {days}日游攻略

## 基本信息
- **目的地**: {destination}
- **天数**: {days}天
- **人数**: {people}人
- **预算**: {budget}级
- **兴趣**: {tags}

## 行程建议
{knowledge_section}

## 预算估算
基于{budget}预算水平：
- 住宿: ¥{lodging}
- 交通: ¥{transport}
- 餐饮: ¥{food}
- 门票: ¥{tickets}
- **总计**: ¥{total}

提示：配置您的 DashScope API Key 以获得 AI 生成的详细行程。",
        destination = request.destination,
        days = request.days,
        people = request.people,
        budget = request.budget,
        tags = request.tags_str(),
    )
}
