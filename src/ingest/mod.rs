// src/ingest/mod.rs
pub mod config;
pub mod dedup;
pub mod http;
pub mod normalize;
pub mod providers;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::error::AggregateError;
use crate::ingest::providers::SourceRegistry;
use crate::ingest::types::{Platform, TrendItem, TrendsPayload};

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 200;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("trends_requests_total", "Aggregation runs started.");
        describe_counter!(
            "trends_items_fetched_total",
            "Items normalized from upstream sources."
        );
        describe_counter!(
            "trends_dedup_removed_total",
            "Items removed as near-duplicates."
        );
        describe_counter!(
            "trends_upstream_errors_total",
            "Source strategy failures and timeouts."
        );
        describe_counter!("trends_empty_total", "Aggregation runs that produced no items.");
        describe_histogram!("trends_aggregate_ms", "Aggregation wall time in milliseconds.");
        describe_histogram!("trends_upstream_ms", "Single upstream call time in milliseconds.");
        describe_gauge!(
            "trends_last_run_ts",
            "Unix ts when the aggregation pipeline last ran."
        );
    });
}

/// Requested source keys → known platforms.
///
/// Missing or blank means every platform. Unknown keys are ignored; if nothing
/// known remains the request is rejected before any upstream call.
pub fn parse_channels(raw: Option<&str>) -> Result<Vec<Platform>, AggregateError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Platform::ALL.to_vec()),
        Some(s) => s,
    };
    let mut out: Vec<Platform> = Vec::new();
    for p in raw.split(',').filter_map(|k| k.trim().parse::<Platform>().ok()) {
        if !out.contains(&p) {
            out.push(p);
        }
    }
    if out.is_empty() {
        return Err(AggregateError::InvalidChannel);
    }
    Ok(out)
}

/// Parse `limit`, falling back to `default` when absent or unparseable, clamp to `1..=max`.
pub fn clamp_limit(raw: Option<&str>, default: usize, max: usize) -> usize {
    let max = max.max(1);
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n.clamp(1, max as i64) as usize)
        .unwrap_or_else(|| default.clamp(1, max))
}

/// Stable sort by hotness (desc), near-duplicate pruning, truncation.
/// Returns the kept items and how many were removed as duplicates.
pub fn rank_and_merge(
    mut items: Vec<TrendItem>,
    threshold: f64,
    limit: usize,
) -> (Vec<TrendItem>, usize) {
    items.sort_by(|a, b| b.hot.total_cmp(&a.hot));
    let before = items.len();
    let mut kept = dedup::dedupe(items, threshold);
    let removed = before - kept.len();
    kept.truncate(limit);
    (kept, removed)
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateSettings {
    pub similarity_threshold: f64,
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: dedup::DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Fan-out/fan-in orchestrator over the source registry.
pub struct Aggregator {
    registry: SourceRegistry,
    settings: AggregateSettings,
}

impl Aggregator {
    pub fn new(registry: SourceRegistry, settings: AggregateSettings) -> Self {
        Self { registry, settings }
    }

    /// Fetch every requested platform concurrently, then rank, dedupe and truncate.
    ///
    /// Individual source failures only shrink the result. An empty final list is
    /// reported as `AllSourcesEmpty`.
    pub async fn aggregate(
        &self,
        channels: &[Platform],
        limit: usize,
    ) -> Result<TrendsPayload, AggregateError> {
        ensure_metrics_described();
        if channels.is_empty() {
            return Err(AggregateError::InvalidChannel);
        }
        counter!("trends_requests_total").increment(1);
        let t0 = std::time::Instant::now();

        let fetches = channels.iter().map(|p| async move {
            match self.registry.adapter(*p) {
                Some(adapter) => adapter.fetch().await,
                None => {
                    tracing::warn!(target: "ingest", platform = %p, "no adapter registered");
                    Vec::new()
                }
            }
        });
        let per_source = futures::future::join_all(fetches).await;

        let counts: Vec<usize> = per_source.iter().map(Vec::len).collect();
        let flat: Vec<TrendItem> = per_source.into_iter().flatten().collect();
        let fetched = flat.len();

        let (items, removed) =
            rank_and_merge(flat, self.settings.similarity_threshold, limit.max(1));

        let now = chrono::Utc::now();
        counter!("trends_dedup_removed_total").increment(removed as u64);
        histogram!("trends_aggregate_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        metrics::gauge!("trends_last_run_ts").set(now.timestamp() as f64);

        tracing::info!(
            target: "ingest",
            channels = channels.len(),
            per_source = ?counts,
            fetched,
            deduped = removed,
            kept = items.len(),
            "aggregation finished"
        );

        if items.is_empty() {
            counter!("trends_empty_total").increment(1);
            return Err(AggregateError::AllSourcesEmpty {
                channels: channels.to_vec(),
                timestamp: now.timestamp_millis(),
            });
        }

        Ok(TrendsPayload {
            items,
            timestamp: now.timestamp_millis(),
            channels: channels.to_vec(),
        })
    }
}
