//! Curated travel-knowledge retrieval.
//!
//! This crate backs the assistant's `search_knowledge_base` tool: curated
//! guide files (scam warnings, hidden spots, money-saving tips) are split
//! into passages, embedded, and stored in SQLite; queries return the top-N
//! passages by cosine similarity.
//!
//! # Overview
//!
//! - [`split_passages`]: blank-line paragraph chunking for ingestion.
//! - [`Embedder`]: embedding backend trait, with [`DashScopeEmbedder`]
//!   (hosted text-embedding-v1) and [`HashEmbedder`] (deterministic offline
//!   feature hashing, no credential required).
//! - [`KnowledgeBase`]: the SQLite store: ingest files or raw text, search
//!   with a bounded result count. Re-ingesting a source replaces its
//!   passages; an empty store returns empty results rather than failing.

mod chunk;
mod embed;
mod error;
mod store;

pub use chunk::split_passages;
pub use embed::{DashScopeEmbedder, Embedder, HashEmbedder};
pub use error::{Error, Result};
pub use store::KnowledgeBase;
