//! LLM provider adapters.

mod dashscope;

pub use dashscope::{DashScopeProvider, DashScopeProviderBuilder, QWEN_MAX, QWEN_TURBO};
