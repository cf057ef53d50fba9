//! Substring search over an already aggregated item set. Never fetches upstream.

use std::cmp::Ordering;

use crate::ingest::types::TrendItem;

pub const MAX_SEARCH_RESULTS: usize = 50;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchOutcome {
    pub items: Vec<TrendItem>,
    pub total: usize,
}

/// Case-insensitive match on title or description; title hits rank first, then hotness.
pub fn search_items(items: &[TrendItem], query: &str) -> SearchOutcome {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return SearchOutcome {
            items: Vec::new(),
            total: 0,
        };
    }

    let mut hits: Vec<(bool, &TrendItem)> = items
        .iter()
        .filter_map(|it| {
            let in_title = it.title.to_lowercase().contains(&q);
            let in_desc = it
                .desc
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&q));
            (in_title || in_desc).then_some((in_title, it))
        })
        .collect();

    hits.sort_by(|(a_title, a), (b_title, b)| match (a_title, b_title) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.hot.total_cmp(&a.hot),
    });

    let total = hits.len();
    SearchOutcome {
        items: hits
            .into_iter()
            .take(MAX_SEARCH_RESULTS)
            .map(|(_, it)| it.clone())
            .collect(),
        total,
    }
}
