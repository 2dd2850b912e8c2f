use super::{sparse::tokenize, store::ScoredPoint};
use std::collections::HashSet;

/// Reorders retrieval candidates by blending the store's score with how many
/// query terms each chunk contains.
#[derive(Debug, Clone)]
pub struct LexicalReranker {
    /// Weight of the retrieval score; the rest goes to term overlap.
    retrieval_weight: f32,
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self {
            retrieval_weight: 0.5,
        }
    }
}

impl LexicalReranker {
    /// Keeps the `top_n` best candidates, best first. Ties keep retrieval order.
    pub fn rerank(&self, query: &str, candidates: Vec<ScoredPoint>, top_n: usize) -> Vec<ScoredPoint> {
        let terms: HashSet<String> = tokenize(query).collect();
        let max_score = candidates
            .iter()
            .map(|c| c.score)
            .fold(f32::NEG_INFINITY, f32::max);
        let min_score = candidates
            .iter()
            .map(|c| c.score)
            .fold(f32::INFINITY, f32::min);
        let spread = max_score - min_score;

        let mut scored: Vec<(f32, ScoredPoint)> = candidates
            .into_iter()
            .map(|candidate| {
                let retrieval = if spread > f32::EPSILON {
                    (candidate.score - min_score) / spread
                } else {
                    1.0
                };
                let overlap = overlap(&terms, &candidate.payload.text);
                let blended =
                    self.retrieval_weight * retrieval + (1.0 - self.retrieval_weight) * overlap;
                (blended, candidate)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_n);
        scored.into_iter().map(|(_, candidate)| candidate).collect()
    }
}

fn overlap(terms: &HashSet<String>, text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let found: HashSet<String> = tokenize(text).filter(|t| terms.contains(t)).collect();
    found.len() as f32 / terms.len() as f32
}
