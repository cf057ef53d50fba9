// src/config/summary.rs
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_SUMMARY_API_URL: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
pub const DEFAULT_SUMMARY_MODEL: &str = "qwen-turbo";

fn default_api_url() -> String {
    DEFAULT_SUMMARY_API_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_SUMMARY_MODEL.to_string()
}
fn default_timeout_ms() -> u64 {
    20_000
}
fn default_cache_ttl_secs() -> u64 {
    24 * 3600
}

/// `[summary]` section. Per-user keys from settings take precedence over `api_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// OpenAI-compatible chat-completions endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Service-wide fallback key. "ENV" (or empty) means: read `QWEN_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            api_key: None,
        }
    }
}

impl SummaryConfig {
    /// Apply `SUMMARY_API_URL` / `SUMMARY_MODEL` and resolve the fallback key.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("SUMMARY_API_URL") {
            if !url.trim().is_empty() {
                self.api_url = url.trim().to_string();
            }
        }
        if let Ok(model) = env::var("SUMMARY_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }

        let wants_env = match self.api_key.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(k) => k.eq_ignore_ascii_case("env"),
        };
        if wants_env {
            self.api_key = env::var("QWEN_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty());
        }

        // Sanitize timeout
        if self.timeout_ms == 0 {
            self.timeout_ms = default_timeout_ms();
        }
    }
}
