//! Hashed term-frequency vectors for the sparse half of hybrid search.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Lower-cased alphanumeric tokens of at least two characters.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
}

/// Encodes `text` as `1 + ln(tf)` weights keyed by token hash, sorted by index.
pub fn encode(text: &str) -> SparseVector {
    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    for token in tokenize(text) {
        *counts.entry(fnv1a(&token)).or_default() += 1;
    }
    let (indices, values) = counts
        .into_iter()
        .map(|(index, tf)| (index, 1.0 + (tf as f32).ln()))
        .unzip();
    SparseVector { indices, values }
}

/// FNV-1a, so indices stay stable across builds and toolchains.
fn fnv1a(token: &str) -> u32 {
    token.bytes().fold(0x811c_9dc5, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_drops_short_tokens() {
        let tokens: Vec<_> = tokenize("¿Dónde está LA Casa, y el patio?").collect();
        assert_eq!(tokens, vec!["dónde", "está", "la", "casa", "el", "patio"]);
    }

    #[test]
    fn test_repeated_terms_share_an_index() {
        let v = encode("balcón balcón madera");
        assert_eq!(v.indices.len(), 2);
        assert!(v.indices.windows(2).all(|w| w[0] < w[1]));

        let balcon = v.indices.iter().position(|&i| i == fnv1a("balcón")).unwrap();
        assert!((v.values[balcon] - (1.0 + 2f32.ln())).abs() < 1e-6);
    }

    #[test]
    fn test_query_and_document_share_vocabulary() {
        let doc = encode("La Casa de los Balcones");
        let query = encode("casa balcones");
        assert!(query.indices.iter().all(|i| doc.indices.contains(i)));
    }

    #[test]
    fn test_empty_text_encodes_empty_vector() {
        assert!(encode(" , . ").is_empty());
    }
}
