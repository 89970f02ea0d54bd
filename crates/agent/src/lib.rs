//! WanderAI assistant core: tool-calling conversation orchestration.
//!
//! This crate drives one conversation turn end to end: it prompts the LLM
//! with a fixed tool registry, executes the tool calls the model requests
//! (place search, nearby search, knowledge lookup), feeds the results back,
//! and returns the final reply. The design is fail-soft throughout: any
//! provider or tool failure degrades to readable text, and
//! [`Orchestrator::run_turn`] never returns an error.
//!
//! # Overview
//!
//! - [`Provider`]: trait over LLM backends, with [`DashScopeProvider`] as
//!   the production adapter (Qwen via the DashScope generation API).
//! - [`ToolHost`]: trait over tool execution, with [`TravelToolHost`]
//!   dispatching to the `maps` and `knowledge` crates.
//! - [`Orchestrator`]: the two-call loop, at most one round of tool use
//!   per turn, sequential dispatch, deterministic result ordering.
//! - [`SessionStore`]: in-memory per-session history, capped at 20
//!   messages.
//! - [`generate_plan`]: one-shot itinerary generation with a knowledge-base
//!   augmented prompt and a static budget fallback.
//!
//! # Example
//!
//! ```ignore
//! use agent::{Credentials, DashScopeProvider, Orchestrator, TravelToolHost};
//! use knowledge::{HashEmbedder, KnowledgeBase};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let provider = DashScopeProvider::builder(Some("sk-...".into())).build();
//! let kb = Arc::new(KnowledgeBase::in_memory(HashEmbedder::default()).unwrap());
//! let tools = TravelToolHost::new(Some("amap-key".into()), kb);
//!
//! let orchestrator = Orchestrator::new(provider, tools);
//! let result = orchestrator
//!     .run_turn("帮我查一下故宫", "session-1", &Credentials::default())
//!     .await;
//! println!("{}", result.reply_text);
//! # }
//! ```

pub mod model;
mod orchestrator;
mod planner;
pub mod providers;
mod session;
pub mod tools;

pub use model::{
    Message, ModelRequest, ModelResponse, Provider, ProviderError, Role, ToolCall, ToolSpec,
};
pub use orchestrator::{Orchestrator, TurnResult};
pub use planner::{PlanRequest, generate_plan};
pub use providers::{DashScopeProvider, DashScopeProviderBuilder, QWEN_MAX, QWEN_TURBO};
pub use session::SessionStore;
pub use tools::{Credentials, ToolHost, ToolOutcome, TravelToolHost, builtin_specs};
