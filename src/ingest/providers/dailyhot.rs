// src/ingest/providers/dailyhot.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;

use crate::error::UpstreamError;
use crate::ingest::config::platform_spec;
use crate::ingest::http::HttpFetcher;
use crate::ingest::normalize::{normalize, DAILY_HOT_FIELDS};
use crate::ingest::types::{Platform, TrendItem, TrendSource};

/// Primary source: the DailyHot aggregator API, tried across mirror bases in order.
///
/// Envelope: `{ "code": 200, "data": [ {title, url, hot, ...}, ... ] }`.
pub struct DailyHotSource {
    http: HttpFetcher,
    bases: Vec<String>,
    cap: usize,
}

impl DailyHotSource {
    pub fn new(http: HttpFetcher, bases: Vec<String>, cap: usize) -> Self {
        Self { http, bases, cap }
    }

    /// Parse one mirror response. `Ok(vec![])` for a well-formed but unusable envelope.
    pub fn parse_envelope(
        platform: Platform,
        body: &Value,
        cap: usize,
    ) -> Result<Vec<TrendItem>, UpstreamError> {
        let code = body.get("code").and_then(Value::as_i64);
        if code != Some(200) {
            return Err(UpstreamError::Malformed(format!(
                "unexpected envelope code {code:?}"
            )));
        }
        let Some(data) = body.get("data").and_then(Value::as_array) else {
            return Err(UpstreamError::Malformed("missing data array".into()));
        };

        Ok(data
            .iter()
            .take(cap)
            .enumerate()
            .filter_map(|(i, raw)| normalize(platform, raw, i, &DAILY_HOT_FIELDS))
            .collect())
    }
}

#[async_trait]
impl TrendSource for DailyHotSource {
    async fn fetch(&self, platform: Platform) -> Result<Vec<TrendItem>, UpstreamError> {
        let spec = platform_spec(platform);
        let mut last_err = None;

        for base in &self.bases {
            let url = format!("{base}{}", spec.endpoint);
            let t0 = std::time::Instant::now();
            let parsed = match self.http.get_json(&url, None).await {
                Ok(body) => Self::parse_envelope(platform, &body, self.cap),
                Err(e) => Err(e),
            };
            histogram!("trends_upstream_ms", "source" => "dailyhot").record(t0.elapsed().as_secs_f64() * 1_000.0);

            match parsed {
                Ok(items) if !items.is_empty() => {
                    counter!("trends_items_fetched_total", "source" => "dailyhot").increment(items.len() as u64);
                    return Ok(items);
                }
                Ok(_) => {
                    tracing::debug!(target: "ingest", %platform, %base, "mirror returned no items");
                }
                Err(e) => {
                    tracing::debug!(target: "ingest", %platform, %base, error = %e, "mirror failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "dailyhot"
    }

    fn upstream_calls(&self) -> usize {
        self.bases.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_envelope_and_caps_before_filtering() {
        let body = json!({
            "code": 200,
            "data": [
                { "title": "A", "url": "https://a", "hot": 10 },
                { "title": "", "url": "https://b", "hot": 9 },
                { "title": "C", "mobileUrl": "https://c", "hotValue": "8,000" },
            ]
        });
        let out = DailyHotSource::parse_envelope(Platform::Weibo, &body, 2).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "A");

        let out = DailyHotSource::parse_envelope(Platform::Weibo, &body, 20).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].url, "https://c");
        assert_eq!(out[1].hot, 8000.0);
    }

    #[test]
    fn rejects_non_200_code() {
        let body = json!({ "code": 500, "data": [] });
        assert!(DailyHotSource::parse_envelope(Platform::Weibo, &body, 20).is_err());
        let body = json!({ "code": 200, "data": { "list": [] } });
        assert!(DailyHotSource::parse_envelope(Platform::Weibo, &body, 20).is_err());
    }
}
