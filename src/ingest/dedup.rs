// src/ingest/dedup.rs
//! Cross-source near-duplicate suppression.
//!
//! Similarity is the Jaccard index of the two titles' lowercased character sets.
//! No tokenization, so it behaves the same for CJK titles and is insensitive to
//! word order. Input must already be sorted by descending hotness: the first
//! occurrence of a topic is the one kept.

use std::collections::HashSet;

use crate::ingest::types::TrendItem;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

fn char_set(s: &str) -> HashSet<char> {
    s.chars().flat_map(char::to_lowercase).collect()
}

fn jaccard(a: &HashSet<char>, b: &HashSet<char>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Character-set Jaccard similarity in `[0.0, 1.0]`. Empty input never matches.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    jaccard(&char_set(a), &char_set(b))
}

/// Greedy single pass: drop an item whose similarity to any kept item exceeds `threshold`.
pub fn dedupe(items: Vec<TrendItem>, threshold: f64) -> Vec<TrendItem> {
    let mut kept: Vec<TrendItem> = Vec::with_capacity(items.len());
    let mut kept_sets: Vec<HashSet<char>> = Vec::with_capacity(items.len());

    for it in items {
        if it.title.is_empty() {
            continue;
        }
        let set = char_set(&it.title);
        let dup = kept_sets.iter().any(|k| jaccard(k, &set) > threshold);
        if dup {
            tracing::trace!(target: "ingest", id = %it.id, source = %it.source, "near-duplicate dropped");
            continue;
        }
        kept_sets.push(set);
        kept.push(it);
    }
    kept
}
