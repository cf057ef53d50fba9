// src/config/app.rs
//! Service configuration: TOML file (optional) + env overrides.
//!
//! Lookup: `$TRENDHUB_CONFIG_PATH`, else `config/trendhub.toml`, else built-in defaults.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::summary::SummaryConfig;
use crate::ingest::dedup::DEFAULT_SIMILARITY_THRESHOLD;
use crate::ingest::http::DEFAULT_USER_AGENT;
use crate::ingest::providers::DEFAULT_PER_PLATFORM_CAP;
use crate::ingest::{AggregateSettings, DEFAULT_LIMIT, MAX_LIMIT};

pub const DEFAULT_CONFIG_PATH: &str = "config/trendhub.toml";
pub const ENV_CONFIG_PATH: &str = "TRENDHUB_CONFIG_PATH";
pub const ENV_SIMILARITY_THRESHOLD: &str = "TRENDHUB_SIMILARITY_THRESHOLD";
pub const ENV_UPSTREAM_TIMEOUT_MS: &str = "TRENDHUB_UPSTREAM_TIMEOUT_MS";
pub const ENV_CACHE_FRESH_SECS: &str = "TRENDHUB_CACHE_FRESH_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub similarity_threshold: f64,
    pub per_platform_cap: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    pub upstream_timeout_ms: u64,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            per_platform_cap: DEFAULT_PER_PLATFORM_CAP,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            upstream_timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub fresh_ttl_secs: u64,
    /// Extra window after `fresh_ttl_secs` during which stale payloads are still served.
    pub stale_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl_secs: 60,
            stale_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub hot_api_bases: Vec<String>,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            hot_api_bases: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub aggregate: AggregateConfig,
    pub cache: CacheConfig,
    pub upstream: UpstreamConfig,
    pub summary: SummaryConfig,
}

impl AppConfig {
    /// Parse an explicit TOML file (no env overrides applied).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Env-selected file (or defaults), then env overrides, then sanitization.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from(&default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Some(t) = parse_env::<f64>(ENV_SIMILARITY_THRESHOLD) {
            self.aggregate.similarity_threshold = t;
        }
        if let Some(ms) = parse_env::<u64>(ENV_UPSTREAM_TIMEOUT_MS) {
            self.aggregate.upstream_timeout_ms = ms;
        }
        if let Some(s) = parse_env::<u64>(ENV_CACHE_FRESH_SECS) {
            self.cache.fresh_ttl_secs = s;
        }
        self.summary.apply_env();
    }

    fn sanitize(&mut self) {
        let a = &mut self.aggregate;
        if !a.similarity_threshold.is_finite() {
            a.similarity_threshold = DEFAULT_SIMILARITY_THRESHOLD;
        }
        a.similarity_threshold = a.similarity_threshold.clamp(0.0, 1.0);
        a.per_platform_cap = a.per_platform_cap.max(1);
        a.max_limit = a.max_limit.max(1);
        a.default_limit = a.default_limit.clamp(1, a.max_limit);
        if a.upstream_timeout_ms == 0 {
            a.upstream_timeout_ms = 8_000;
        }
    }

    pub fn aggregate_settings(&self) -> AggregateSettings {
        AggregateSettings {
            similarity_threshold: self.aggregate.similarity_threshold,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
