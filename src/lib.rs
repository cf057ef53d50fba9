// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod search;
pub mod settings;
pub mod summary;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

pub use crate::api::{router, AppState};

use crate::cache::MemoryKv;
use crate::config::AppConfig;
use crate::ingest::config::hot_api_bases;
use crate::ingest::http::HttpFetcher;
use crate::ingest::providers::SourceRegistry;
use crate::ingest::Aggregator;
use crate::summary::ChatCompletionSummarizer;

/// Build the full application from `AppConfig::load()`: live sources, in-process
/// KV store, chat-completion summarizer and `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load()?;
    build_app(cfg)
}

pub fn build_app(cfg: AppConfig) -> anyhow::Result<Router> {
    let metrics = crate::metrics::Metrics::init(cfg.cache.fresh_ttl_secs)?;

    let http = HttpFetcher::new(
        Duration::from_millis(cfg.aggregate.upstream_timeout_ms),
        &cfg.upstream.user_agent,
    )?;
    let bases = hot_api_bases(&cfg.upstream.hot_api_bases);
    tracing::info!(target: "ingest", mirrors = ?bases, "trend sources configured");

    let registry = SourceRegistry::standard(http, bases, cfg.aggregate.per_platform_cap);
    let aggregator = Aggregator::new(registry, cfg.aggregate_settings());
    let summarizer = Arc::new(ChatCompletionSummarizer::new(&cfg.summary)?);

    let state = AppState::new(aggregator, Arc::new(MemoryKv::new()), summarizer, cfg);
    Ok(router(state).merge(metrics.router()))
}
