//! Embedding backends.
//!
//! Two implementations: [`DashScopeEmbedder`] calls the hosted
//! text-embedding-v1 model, [`HashEmbedder`] is a deterministic offline
//! fallback so ingestion and search work without any credential.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::{Error, Result};

const DASHSCOPE_EMBEDDING_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/embeddings/text-embedding/text-embedding";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for dense text embedding backends.
pub trait Embedder: Send + Sync {
    /// Embed one text into a dense vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

/// DashScope text-embedding client.
pub struct DashScopeEmbedder {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl DashScopeEmbedder {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key: api_key.into(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    output: EmbeddingOutput,
}

#[derive(Debug, Deserialize)]
struct EmbeddingOutput {
    embeddings: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl Embedder for DashScopeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = json!({
            "model": self.model,
            "input": { "texts": [text] },
        });

        let response = self
            .http
            .post(DASHSCOPE_EMBEDDING_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("{status}: {body}")));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let row = body
            .output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embeddings in response".to_string()))?;

        Ok(row.embedding)
    }
}

/// Deterministic offline embedder based on character n-gram hashing.
///
/// Each character unigram and bigram is hashed into a fixed number of
/// buckets and the histogram is L2-normalized. Identical texts always embed
/// identically, so cosine ranking is reproducible without any API access.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, gram: &[char]) -> usize {
        let mut hasher = DefaultHasher::new();
        gram.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let chars: Vec<char> = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let mut vector = vec![0.0f32; self.dimension];
        for ch in &chars {
            vector[self.bucket(&[*ch])] += 1.0;
        }
        for pair in chars.windows(2) {
            vector[self.bucket(pair)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }
}
