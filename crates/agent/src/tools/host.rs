//! Tool dispatch against the live collaborators.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use knowledge::{Embedder, KnowledgeBase};
use maps::{DEFAULT_RADIUS, MapsClient, Poi};

use crate::model::ToolSpec;
use crate::tools::outcome::{ERR_CREDENTIAL_MISSING, ERR_UNSUPPORTED_TOOL, ToolOutcome};
use crate::tools::specs::{SEARCH_KNOWLEDGE_BASE, SEARCH_NEARBY, SEARCH_POI, builtin_specs};

/// How many POIs a place search feeds back to the model.
const POI_LIMIT: usize = 3;
/// How many POIs an around-search feeds back to the model.
const NEARBY_LIMIT: usize = 5;
/// How many knowledge passages a lookup returns.
const DOCUMENT_LIMIT: usize = 3;

/// Per-turn credentials supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// DashScope key; resolved at provider construction, carried for parity
    /// with the turn boundary.
    pub llm_key: Option<String>,
    /// Amap key; overrides the host's configured default for this turn.
    pub map_key: Option<String>,
}

/// Trait for tool execution hosts.
///
/// `dispatch` is infallible by design: every failure is captured in the
/// returned [`ToolOutcome`] so one bad tool never aborts a turn.
pub trait ToolHost: Send + Sync {
    /// The tool specifications offered to the model.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call with already-parsed arguments.
    fn dispatch(
        &self,
        name: &str,
        args: &Value,
        credentials: &Credentials,
    ) -> impl Future<Output = ToolOutcome> + Send;
}

/// The production tool host: Amap searches plus the knowledge base.
pub struct TravelToolHost<E> {
    specs: Vec<ToolSpec>,
    http: reqwest::Client,
    map_key: Option<String>,
    knowledge: Arc<KnowledgeBase<E>>,
}

impl<E: Embedder> TravelToolHost<E> {
    pub fn new(map_key: Option<String>, knowledge: Arc<KnowledgeBase<E>>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            specs: builtin_specs(),
            http,
            map_key,
            knowledge,
        }
    }

    fn maps_client(&self, credentials: &Credentials) -> Option<MapsClient> {
        let key = credentials
            .map_key
            .as_deref()
            .or(self.map_key.as_deref())?;
        Some(MapsClient::with_http(self.http.clone(), key))
    }

    async fn search_poi(&self, args: &Value, credentials: &Credentials) -> ToolOutcome {
        let Some(keywords) = args.get("keywords").and_then(Value::as_str) else {
            return ToolOutcome::fail("missing required argument: keywords");
        };
        let city = args.get("city").and_then(Value::as_str);

        let Some(client) = self.maps_client(credentials) else {
            return ToolOutcome::fail(ERR_CREDENTIAL_MISSING);
        };

        match client.search_poi(keywords, city).await {
            Ok(pois) if !pois.is_empty() => ToolOutcome::ok(json!({
                "success": true,
                "count": pois.len(),
                "pois": poi_values(&pois, POI_LIMIT),
                "summary": format!("找到{}个相关地点", pois.len()),
            })),
            Ok(_) => ToolOutcome::fail("搜索失败"),
            Err(e) => ToolOutcome::fail(e.to_string()),
        }
    }

    async fn search_nearby(&self, args: &Value, credentials: &Credentials) -> ToolOutcome {
        let Some(location) = args.get("location").and_then(Value::as_str) else {
            return ToolOutcome::fail("missing required argument: location");
        };
        let Some(keywords) = args.get("keywords").and_then(Value::as_str) else {
            return ToolOutcome::fail("missing required argument: keywords");
        };
        let radius = parse_radius(args.get("radius"));

        let Some(client) = self.maps_client(credentials) else {
            return ToolOutcome::fail(ERR_CREDENTIAL_MISSING);
        };

        match client.search_nearby(location, keywords, radius).await {
            Ok(pois) if !pois.is_empty() => ToolOutcome::ok(json!({
                "success": true,
                "count": pois.len(),
                "pois": poi_values(&pois, NEARBY_LIMIT),
                "summary": format!("找到{}个附近设施", pois.len()),
            })),
            Ok(_) => ToolOutcome::fail("搜索失败"),
            Err(e) => ToolOutcome::fail(e.to_string()),
        }
    }

    async fn search_knowledge_base(&self, args: &Value) -> ToolOutcome {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return ToolOutcome::fail("missing required argument: query");
        };

        match self.knowledge.search(query, DOCUMENT_LIMIT).await {
            Ok(documents) if !documents.is_empty() => ToolOutcome::ok(json!({
                "success": true,
                "documents": documents,
                "summary": format!("找到{}条相关建议", documents.len()),
            })),
            Ok(_) => ToolOutcome::fail("知识库中未找到相关信息"),
            Err(e) => ToolOutcome::fail(e.to_string()),
        }
    }
}

impl<E: Embedder> ToolHost for TravelToolHost<E> {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn dispatch(&self, name: &str, args: &Value, credentials: &Credentials) -> ToolOutcome {
        tracing::info!(tool = name, %args, "dispatching tool call");
        let outcome = match name {
            SEARCH_POI => self.search_poi(args, credentials).await,
            SEARCH_NEARBY => self.search_nearby(args, credentials).await,
            SEARCH_KNOWLEDGE_BASE => self.search_knowledge_base(args).await,
            _ => ToolOutcome::fail(ERR_UNSUPPORTED_TOOL),
        };
        if let Some(error) = &outcome.error {
            tracing::warn!(tool = name, error = %error, "tool call failed");
        }
        outcome
    }
}

fn poi_values(pois: &[Poi], limit: usize) -> Vec<Value> {
    pois.iter()
        .take(limit)
        .filter_map(|poi| serde_json::to_value(poi).ok())
        .collect()
}

/// Radius may arrive as a number or a numeric string.
fn parse_radius(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().map(|r| r as u32).unwrap_or(DEFAULT_RADIUS),
        Some(Value::String(s)) => s.parse().unwrap_or(DEFAULT_RADIUS),
        _ => DEFAULT_RADIUS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge::HashEmbedder;

    fn host() -> TravelToolHost<HashEmbedder> {
        let kb = KnowledgeBase::in_memory(HashEmbedder::default()).unwrap();
        TravelToolHost::new(None, Arc::new(kb))
    }

    async fn host_with_tips(tips: &str) -> TravelToolHost<HashEmbedder> {
        let kb = Arc::new(KnowledgeBase::in_memory(HashEmbedder::default()).unwrap());
        kb.ingest_text("tips", tips).await.unwrap();
        TravelToolHost::new(None, kb)
    }

    #[tokio::test]
    async fn unknown_tool_is_unsupported() {
        let host = host();
        let outcome = host
            .dispatch("delete_everything", &json!({}), &Credentials::default())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some(ERR_UNSUPPORTED_TOOL));
    }

    #[tokio::test]
    async fn poi_search_without_key_is_credential_missing() {
        let host = host();
        let outcome = host
            .dispatch(
                SEARCH_POI,
                &json!({"keywords": "故宫"}),
                &Credentials::default(),
            )
            .await;
        assert_eq!(outcome.error.as_deref(), Some(ERR_CREDENTIAL_MISSING));
    }

    #[tokio::test]
    async fn nearby_without_key_is_credential_missing() {
        let host = host();
        let outcome = host
            .dispatch(
                SEARCH_NEARBY,
                &json!({"location": "116.39,39.90", "keywords": "停车场"}),
                &Credentials::default(),
            )
            .await;
        assert_eq!(outcome.error.as_deref(), Some(ERR_CREDENTIAL_MISSING));
    }

    #[tokio::test]
    async fn missing_required_argument_is_captured() {
        let host = host();
        let outcome = host
            .dispatch(SEARCH_POI, &json!({}), &Credentials::default())
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("keywords"));
    }

    #[tokio::test]
    async fn knowledge_lookup_returns_documents() {
        let host =
            host_with_tips("故宫周一闭馆，提前在官网买票。\n\n长城别去八达岭，慕田峪人少。").await;
        let outcome = host
            .dispatch(
                SEARCH_KNOWLEDGE_BASE,
                &json!({"query": "故宫 买票"}),
                &Credentials::default(),
            )
            .await;
        assert!(outcome.success);
        let docs = outcome.payload["documents"].as_array().unwrap();
        assert!(!docs.is_empty());
        assert!(outcome.payload["summary"].as_str().unwrap().contains("条相关建议"));
    }

    #[tokio::test]
    async fn empty_knowledge_base_is_a_readable_failure() {
        let host = host();
        let outcome = host
            .dispatch(
                SEARCH_KNOWLEDGE_BASE,
                &json!({"query": "三亚"}),
                &Credentials::default(),
            )
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("知识库中未找到相关信息"));
    }

    #[test]
    fn radius_parsing_is_lenient() {
        assert_eq!(parse_radius(Some(&json!(500))), 500);
        assert_eq!(parse_radius(Some(&json!("800"))), 800);
        assert_eq!(parse_radius(Some(&json!("not a number"))), DEFAULT_RADIUS);
        assert_eq!(parse_radius(None), DEFAULT_RADIUS);
    }
}
