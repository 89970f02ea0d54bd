//! Text chunking for ingestion.

/// Split a document into passages on blank lines.
///
/// Passages are trimmed; empty ones are dropped. This mirrors how the
/// curated guide files are written: one tip or anecdote per paragraph.
pub fn split_passages(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
