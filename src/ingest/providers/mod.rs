// src/ingest/providers/mod.rs
//! Source adapters.
//!
//! Each platform owns an ordered chain of `TrendSource` strategies (DailyHot mirrors
//! first, then the platform's public endpoint when it has one). The chain is tried
//! in order until a strategy yields items; failures are logged and swallowed.

pub mod dailyhot;
pub mod fallback;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;

use crate::ingest::config::platform_spec;
use crate::ingest::http::HttpFetcher;
use crate::ingest::types::{Platform, TrendItem, TrendSource};

use self::dailyhot::DailyHotSource;
use self::fallback::PublicEndpointSource;

pub const DEFAULT_PER_PLATFORM_CAP: usize = 20;

/// One platform's strategy chain. `fetch` never fails; the worst case is an empty list.
#[derive(Clone)]
pub struct PlatformAdapter {
    platform: Platform,
    chain: Vec<Arc<dyn TrendSource>>,
    cap: usize,
    timeout: Duration,
}

impl PlatformAdapter {
    pub fn new(
        platform: Platform,
        chain: Vec<Arc<dyn TrendSource>>,
        cap: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            platform,
            chain,
            cap,
            timeout,
        }
    }

    pub async fn fetch(&self) -> Vec<TrendItem> {
        for source in &self.chain {
            let budget = self.budget(source.as_ref());
            let res = tokio::time::timeout(budget, source.fetch(self.platform)).await;
            match res {
                Ok(Ok(mut items)) if !items.is_empty() => {
                    items.truncate(self.cap);
                    tracing::debug!(
                        target: "ingest",
                        platform = %self.platform,
                        source = source.name(),
                        list = platform_spec(self.platform).name,
                        count = items.len(),
                        "source yielded items"
                    );
                    return items;
                }
                Ok(Ok(_)) => {
                    tracing::debug!(target: "ingest", platform = %self.platform, source = source.name(), "source empty");
                }
                Ok(Err(e)) => {
                    tracing::warn!(target: "ingest", platform = %self.platform, source = source.name(), error = %e, "source failed");
                    counter!("trends_upstream_errors_total", "platform" => self.platform.key()).increment(1);
                }
                Err(_) => {
                    tracing::warn!(
                        target: "ingest",
                        platform = %self.platform,
                        source = source.name(),
                        timeout_ms = budget.as_millis() as u64,
                        "source timed out"
                    );
                    counter!("trends_upstream_errors_total", "platform" => self.platform.key()).increment(1);
                }
            }
        }
        Vec::new()
    }

    /// Deadline for one strategy: the per-call timeout times the upstream calls it may make.
    fn budget(&self, source: &dyn TrendSource) -> Duration {
        let calls = u32::try_from(source.upstream_calls().max(1)).unwrap_or(u32::MAX);
        self.timeout.saturating_mul(calls)
    }
}

/// Platform → adapter map used by the orchestrator.
#[derive(Clone)]
pub struct SourceRegistry {
    adapters: HashMap<Platform, PlatformAdapter>,
    cap: usize,
    timeout: Duration,
}

impl SourceRegistry {
    pub fn new(cap: usize, timeout: Duration) -> Self {
        Self {
            adapters: HashMap::new(),
            cap: cap.max(1),
            timeout,
        }
    }

    /// Register (or replace) the chain for one platform.
    pub fn with_chain(mut self, platform: Platform, chain: Vec<Arc<dyn TrendSource>>) -> Self {
        self.adapters.insert(
            platform,
            PlatformAdapter::new(platform, chain, self.cap, self.timeout),
        );
        self
    }

    /// DailyHot mirrors for every platform, plus public fallbacks where available.
    pub fn standard(http: HttpFetcher, bases: Vec<String>, cap: usize) -> Self {
        let timeout = http.timeout();
        let primary: Arc<dyn TrendSource> =
            Arc::new(DailyHotSource::new(http.clone(), bases, cap));

        Platform::ALL
            .into_iter()
            .fold(Self::new(cap, timeout), |reg, platform| {
                let mut chain = vec![primary.clone()];
                if let Some(fb) = PublicEndpointSource::for_platform(platform, http.clone(), cap) {
                    chain.push(Arc::new(fb));
                }
                reg.with_chain(platform, chain)
            })
    }

    pub fn adapter(&self, platform: Platform) -> Option<&PlatformAdapter> {
        self.adapters.get(&platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        items: Vec<TrendItem>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TrendSource for Fixed {
        async fn fetch(&self, _p: Platform) -> Result<Vec<TrendItem>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl TrendSource for Failing {
        async fn fetch(&self, _p: Platform) -> Result<Vec<TrendItem>, UpstreamError> {
            Err(UpstreamError::Status(503))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Sluggish {
        delay: Duration,
        calls: usize,
    }

    #[async_trait::async_trait]
    impl TrendSource for Sluggish {
        async fn fetch(&self, _p: Platform) -> Result<Vec<TrendItem>, UpstreamError> {
            tokio::time::sleep(self.delay).await;
            Ok(items(2))
        }
        fn name(&self) -> &'static str {
            "sluggish"
        }
        fn upstream_calls(&self) -> usize {
            self.calls
        }
    }

    fn items(n: usize) -> Vec<TrendItem> {
        (0..n)
            .map(|i| TrendItem {
                id: format!("zhihu_{i}"),
                title: format!("t{i}"),
                desc: None,
                url: "#".into(),
                hot: i as f64,
                cover: None,
                source: Platform::Zhihu,
                tag: None,
                timestamp: 0,
            })
            .collect()
    }

    #[tokio::test]
    async fn falls_back_after_error_and_empty() {
        let empty = Arc::new(Fixed {
            items: vec![],
            calls: AtomicUsize::new(0),
        });
        let good = Arc::new(Fixed {
            items: items(3),
            calls: AtomicUsize::new(0),
        });
        let chain: Vec<Arc<dyn TrendSource>> = vec![Arc::new(Failing), empty.clone(), good.clone()];
        let adapter = PlatformAdapter::new(
            Platform::Zhihu,
            chain,
            20,
            Duration::from_secs(1),
        );
        let out = adapter.fetch().await;
        assert_eq!(out.len(), 3);
        assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn caps_contribution() {
        let src = Arc::new(Fixed {
            items: items(50),
            calls: AtomicUsize::new(0),
        });
        let adapter = PlatformAdapter::new(Platform::Zhihu, vec![src as Arc<dyn TrendSource>], 20, Duration::from_secs(1));
        assert_eq!(adapter.fetch().await.len(), 20);
    }

    #[tokio::test]
    async fn all_failing_is_empty() {
        let adapter = PlatformAdapter::new(
            Platform::Zhihu,
            vec![Arc::new(Failing) as Arc<dyn TrendSource>],
            20,
            Duration::from_secs(1),
        );
        assert!(adapter.fetch().await.is_empty());
    }

    #[tokio::test]
    async fn deadline_scales_with_upstream_calls() {
        let timeout = Duration::from_millis(50);
        let three_calls = PlatformAdapter::new(
            Platform::Zhihu,
            vec![Arc::new(Sluggish {
                delay: Duration::from_millis(90),
                calls: 3,
            }) as Arc<dyn TrendSource>],
            20,
            timeout,
        );
        assert_eq!(three_calls.fetch().await.len(), 2);

        let one_call = PlatformAdapter::new(
            Platform::Zhihu,
            vec![Arc::new(Sluggish {
                delay: Duration::from_millis(90),
                calls: 1,
            }) as Arc<dyn TrendSource>],
            20,
            timeout,
        );
        assert!(one_call.fetch().await.is_empty());
    }
}
