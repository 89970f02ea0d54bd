//! SQLite-backed passage store with cosine similarity search.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, params};

use crate::embed::Embedder;
use crate::{Result, split_passages};

/// A knowledge base of embedded text passages.
///
/// Passages live in a single SQLite table with their embedding stored as a
/// little-endian `f32` blob. The corpus is small (curated guide files), so
/// search scores every row in memory instead of maintaining an index.
pub struct KnowledgeBase<E> {
    conn: Mutex<Connection>,
    embedder: E,
}

impl<E: Embedder> KnowledgeBase<E> {
    /// Open or create a knowledge base at the given path.
    pub fn open(path: impl AsRef<Path>, embedder: E) -> Result<Self> {
        let conn = Connection::open(path)?;
        let kb = Self {
            conn: Mutex::new(conn),
            embedder,
        };
        kb.init_schema()?;
        Ok(kb)
    }

    /// Create an in-memory knowledge base (useful for testing).
    pub fn in_memory(embedder: E) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let kb = Self {
            conn: Mutex::new(conn),
            embedder,
        };
        kb.init_schema()?;
        Ok(kb)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS passages (
                id INTEGER PRIMARY KEY,
                source TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_passages_source ON passages(source);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-statement; the connection is
        // still usable for our append-only workload.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ingest a text file, replacing any passages previously loaded from it.
    ///
    /// Returns the number of passages stored.
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let source = path.to_string_lossy().into_owned();
        self.ingest_text(&source, &text).await
    }

    /// Ingest raw text under a source label, replacing that source's passages.
    pub async fn ingest_text(&self, source: &str, text: &str) -> Result<usize> {
        let passages = split_passages(text);
        if passages.is_empty() {
            tracing::warn!(source, "no passages found to ingest");
            return Ok(0);
        }

        // Embed outside the connection lock; the lock is never held across
        // an await point.
        let mut rows = Vec::with_capacity(passages.len());
        for passage in &passages {
            let vector = self.embedder.embed(passage).await?;
            rows.push((passage.clone(), encode_embedding(&vector)));
        }

        let now = Utc::now().to_rfc3339();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM passages WHERE source = ?1", params![source])?;
        for (content, blob) in rows {
            tx.execute(
                "INSERT INTO passages (source, content, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![source, content, blob, now],
            )?;
        }
        tx.commit()?;

        tracing::info!(source, count = passages.len(), "ingested passages");
        Ok(passages.len())
    }

    /// Number of stored passages.
    pub fn len(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the store holds no passages.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Return the top `n` passages most similar to the query.
    ///
    /// An empty store yields an empty list, not an error.
    pub async fn search(&self, query: &str, n: usize) -> Result<Vec<String>> {
        let query_vec = self.embedder.embed(query).await?;

        let mut scored: Vec<(f32, String)> = {
            let conn = self.lock();
            let mut stmt = conn.prepare("SELECT content, embedding FROM passages ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                let content: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((content, blob))
            })?;

            rows.filter_map(|r| r.ok())
                .map(|(content, blob)| {
                    let vector = decode_embedding(&blob);
                    (cosine(&query_vec, &vector), content)
                })
                .collect()
        };

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(n).map(|(_, c)| c).collect())
    }
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
