// src/ingest/providers/fallback.rs
//! Platform-specific public endpoints used when every DailyHot mirror comes back empty.
//!
//! Each platform is described by data (endpoint, referer, list location, field map),
//! so adding one means adding a `FallbackSpec`, not a new parser.

use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;

use crate::error::UpstreamError;
use crate::ingest::http::HttpFetcher;
use crate::ingest::normalize::{lookup, normalize, FieldMap, UrlRule, URL_PLACEHOLDER};
use crate::ingest::types::{Platform, TrendItem, TrendSource};

#[derive(Debug, Clone, Copy)]
pub struct FallbackSpec {
    pub endpoint: &'static str,
    pub referer: &'static str,
    /// Candidate locations of the record array, tried in order.
    pub list_paths: &'static [&'static str],
    pub fields: FieldMap,
}

const WEIBO: FallbackSpec = FallbackSpec {
    endpoint: "https://weibo.com/ajax/side/hotSearch",
    referer: "https://weibo.com/",
    list_paths: &["data.realtime"],
    fields: FieldMap {
        title: &["word"],
        url: &[
            UrlRule::TitleSearch {
                base: "https://s.weibo.com/weibo",
                param: "q",
            },
            UrlRule::Fixed(URL_PLACEHOLDER),
        ],
        desc: &["note"],
        hot: &["num", "raw_hot", "hot"],
        cover: &[],
        tag: &["category"],
    },
};

const ZHIHU: FallbackSpec = FallbackSpec {
    endpoint: "https://www.zhihu.com/api/v3/feed/topstory/hot-lists/total?limit=50&desktop=true",
    referer: "https://www.zhihu.com/hot",
    list_paths: &["data"],
    fields: FieldMap {
        title: &["target.title", "target.title_area.title"],
        url: &[
            UrlRule::Prefixed {
                field: "target.id",
                prefix: "https://www.zhihu.com/question/",
            },
            UrlRule::Field("target.url"),
            UrlRule::Fixed("https://www.zhihu.com/hot"),
        ],
        desc: &["target.excerpt"],
        hot: &["detail_text", "detailText", "score"],
        cover: &["target.image_area.url", "target.thumbnail"],
        tag: &[],
    },
};

const BILIBILI: FallbackSpec = FallbackSpec {
    endpoint: "https://api.bilibili.com/x/web-interface/popular?pn=1&ps=20",
    referer: "https://www.bilibili.com/",
    list_paths: &["data.list"],
    fields: FieldMap {
        title: &["title"],
        url: &[
            UrlRule::Field("short_link_v2"),
            UrlRule::Field("short_link"),
            UrlRule::Prefixed {
                field: "bvid",
                prefix: "https://www.bilibili.com/video/",
            },
            UrlRule::Fixed(URL_PLACEHOLDER),
        ],
        desc: &["rcmd_reason.content", "desc"],
        hot: &["stat.view", "stat.like"],
        cover: &["pic"],
        tag: &[],
    },
};

const BAIDU: FallbackSpec = FallbackSpec {
    endpoint: "https://top.baidu.com/api/board?platform=wise&tab=realtime",
    referer: "https://top.baidu.com/",
    list_paths: &["data.cards.0.content", "data.content"],
    fields: FieldMap {
        title: &["word", "query"],
        url: &[
            UrlRule::Field("rawUrl"),
            UrlRule::Field("url"),
            UrlRule::TitleSearch {
                base: "https://www.baidu.com/s",
                param: "wd",
            },
            UrlRule::Fixed(URL_PLACEHOLDER),
        ],
        desc: &["desc", "desc2"],
        hot: &["hotScore", "hot_score", "hot", "value"],
        cover: &["img", "imgUrl"],
        tag: &[],
    },
};

pub fn fallback_spec(platform: Platform) -> Option<FallbackSpec> {
    match platform {
        Platform::Weibo => Some(WEIBO),
        Platform::Zhihu => Some(ZHIHU),
        Platform::Bilibili => Some(BILIBILI),
        Platform::Baidu => Some(BAIDU),
        _ => None,
    }
}

/// Fetches one platform's native public listing.
pub struct PublicEndpointSource {
    platform: Platform,
    spec: FallbackSpec,
    endpoint: String,
    http: HttpFetcher,
    cap: usize,
}

impl PublicEndpointSource {
    pub fn for_platform(platform: Platform, http: HttpFetcher, cap: usize) -> Option<Self> {
        let spec = fallback_spec(platform)?;
        Some(Self {
            platform,
            spec,
            endpoint: spec.endpoint.to_string(),
            http,
            cap,
        })
    }

    /// Point at a different host (local mirrors, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn parse(
        platform: Platform,
        spec: &FallbackSpec,
        body: &Value,
        cap: usize,
    ) -> Result<Vec<TrendItem>, UpstreamError> {
        let list = spec
            .list_paths
            .iter()
            .find_map(|p| lookup(body, p).and_then(Value::as_array))
            .ok_or_else(|| UpstreamError::Malformed("record list not found".into()))?;

        Ok(list
            .iter()
            .take(cap)
            .enumerate()
            .filter_map(|(i, raw)| normalize(platform, raw, i, &spec.fields))
            .collect())
    }
}

#[async_trait]
impl TrendSource for PublicEndpointSource {
    async fn fetch(&self, platform: Platform) -> Result<Vec<TrendItem>, UpstreamError> {
        if platform != self.platform {
            return Ok(Vec::new());
        }
        let body = self
            .http
            .get_json(&self.endpoint, Some(self.spec.referer))
            .await?;
        let items = Self::parse(platform, &self.spec, &body, self.cap)?;
        counter!("trends_items_fetched_total", "source" => "fallback").increment(items.len() as u64);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "public-endpoint"
    }
}
