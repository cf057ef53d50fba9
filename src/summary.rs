//! AI summary collaborator: provider abstraction + KV-backed result cache.
//!
//! Outside the aggregation pipeline. One chat-completion call per miss, with its
//! own (longer) timeout.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::KvStore;
use crate::config::summary::SummaryConfig;
use crate::error::SummaryError;

const SYSTEM_PROMPT: &str =
    "你是一个专业的新闻摘要助手，擅长用简洁的语言总结热点新闻的核心内容。";

/// Input for one summary.
#[derive(Debug, Clone)]
pub struct SummaryInput<'a> {
    pub api_key: &'a str,
    pub title: &'a str,
    pub content: Option<&'a str>,
}

pub type SummaryFuture<'a> = Pin<Box<dyn Future<Output = Result<String, SummaryError>> + Send + 'a>>;

/// Trait object used by the HTTP layer (and swapped for stubs in tests).
pub trait Summarizer: Send + Sync {
    fn summarize<'a>(&'a self, input: SummaryInput<'a>) -> SummaryFuture<'a>;
    /// Model name reported back to clients.
    fn model(&self) -> &str;
}

pub type DynSummarizer = Arc<dyn Summarizer>;

/// OpenAI-compatible chat-completions client (DashScope compatible mode by default).
pub struct ChatCompletionSummarizer {
    http: reqwest::Client,
    api_url: String,
    model: String,
}

impl ChatCompletionSummarizer {
    pub fn new(cfg: &SummaryConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::ingest::http::DEFAULT_USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            api_url: cfg.api_url.clone(),
            model: cfg.model.clone(),
        })
    }
}

pub fn build_prompt(title: &str, content: Option<&str>) -> String {
    let detail = content
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("详情：{c}\n"))
        .unwrap_or_default();
    format!(
        "请用简洁的语言（不超过100字）总结以下热点新闻的核心内容，帮助读者快速了解要点：\n\n\
         标题：{title}\n{detail}\n\
         要求：\n\
         1. 直接输出摘要内容，不要有\"摘要：\"等前缀\n\
         2. 语言简洁明了，突出关键信息\n\
         3. 保持客观中立的语气"
    )
}

impl Summarizer for ChatCompletionSummarizer {
    fn summarize<'a>(&'a self, input: SummaryInput<'a>) -> SummaryFuture<'a> {
        Box::pin(async move {
            if input.api_key.is_empty() {
                return Err(SummaryError::MissingApiKey);
            }

            #[derive(Serialize)]
            struct Msg<'m> {
                role: &'m str,
                content: &'m str,
            }
            #[derive(Serialize)]
            struct Req<'m> {
                model: &'m str,
                messages: Vec<Msg<'m>>,
                max_tokens: u32,
                temperature: f32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let prompt = build_prompt(input.title, input.content);
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: &prompt,
                    },
                ],
                max_tokens: 200,
                temperature: 0.7,
            };

            let resp = self
                .http
                .post(&self.api_url)
                .bearer_auth(input.api_key)
                .json(&req)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                tracing::warn!(target: "api", status = status.as_u16(), "summary upstream rejected request");
                return Err(SummaryError::Upstream {
                    status: status.as_u16(),
                });
            }

            let body: Resp = resp.json().await?;
            let text = body
                .choices
                .first()
                .map(|c| c.message.content.trim().to_string())
                .unwrap_or_default();
            if text.is_empty() {
                Err(SummaryError::Empty)
            } else {
                Ok(text)
            }
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Fixed output; for tests and local runs without a key.
#[derive(Clone)]
pub struct MockSummarizer {
    pub fixed: String,
}

impl Summarizer for MockSummarizer {
    fn summarize<'a>(&'a self, _input: SummaryInput<'a>) -> SummaryFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn model(&self) -> &str {
        "mock"
    }
}

/// Cache key for a title: first 16 hex chars of its SHA-256.
pub fn summary_cache_key(title: &str) -> String {
    let digest = Sha256::digest(title.as_bytes());
    let mut out = String::with_capacity(24);
    out.push_str("summary:");
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Serve from the KV cache, or call the provider and cache a successful result.
/// Cache failures are logged and ignored.
pub async fn summarize_cached(
    kv: &dyn KvStore,
    summarizer: &dyn Summarizer,
    input: SummaryInput<'_>,
    ttl: Duration,
) -> Result<(String, bool), SummaryError> {
    let key = summary_cache_key(input.title);
    match kv.get(&key).await {
        Ok(Some(serde_json::Value::String(hit))) if !hit.is_empty() => return Ok((hit, true)),
        Ok(_) => {}
        Err(e) => tracing::warn!(target: "cache", error = ?e, "summary cache read failed"),
    }

    let summary = summarizer.summarize(input).await?;
    if let Err(e) = kv
        .put(&key, serde_json::Value::String(summary.clone()), Some(ttl))
        .await
    {
        tracing::warn!(target: "cache", error = ?e, "summary cache write failed");
    }
    Ok((summary, false))
}
