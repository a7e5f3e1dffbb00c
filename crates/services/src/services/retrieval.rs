//! Linear-scan similarity search over stored document chunks.

use std::cmp::Ordering;

use db::models::document_chunk::DocumentChunk;
use tracing::debug;

use super::config::RagConfig;

pub const NO_CONTEXT: &str = "Aucun document source disponible.";

/// Cosine similarity; 0 when the lengths differ or either vector has zero norm
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub content: String,
    pub source_file: String,
    pub score: f64,
}

/// Score every chunk against `query`, best first. Chunks whose embedding
/// does not decode (or is empty) are skipped.
pub fn rank_chunks(query: &[f64], chunks: Vec<DocumentChunk>) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding_vector().filter(|e| !e.is_empty())?;
            Some(ScoredChunk {
                score: cosine_similarity(query, &embedding),
                content: chunk.content,
                source_file: chunk.source_file,
            })
        })
        .collect();
    // sort_by is stable: equal scores keep storage order
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}

/// Render the context block from the best `top_k` chunks scoring above the threshold
pub fn select_context(ranked: &[ScoredChunk], rag: RagConfig) -> String {
    for chunk in ranked.iter().take(rag.top_k) {
        debug!(
            score = chunk.score,
            source = %chunk.source_file,
            preview = %chunk.content.chars().take(50).collect::<String>(),
            "retrieval candidate"
        );
    }

    let lines: Vec<String> = ranked
        .iter()
        .take(rag.top_k)
        .filter(|chunk| chunk.score > rag.similarity_threshold)
        .map(|chunk| format!("[{}]: {}", chunk.source_file, chunk.content))
        .collect();

    if lines.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        lines.join("\n")
    }
}
