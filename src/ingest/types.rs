// src/ingest/types.rs
use std::fmt;
use std::str::FromStr;

use crate::error::UpstreamError;

/// Supported content platforms. Serialized as the lowercase key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Weibo,
    Zhihu,
    Bilibili,
    Douyin,
    Baidu,
    Toutiao,
    Douban,
    Juejin,
    Github,
    V2ex,
}

impl Platform {
    pub const ALL: [Platform; 10] = [
        Platform::Weibo,
        Platform::Zhihu,
        Platform::Bilibili,
        Platform::Douyin,
        Platform::Baidu,
        Platform::Toutiao,
        Platform::Douban,
        Platform::Juejin,
        Platform::Github,
        Platform::V2ex,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Platform::Weibo => "weibo",
            Platform::Zhihu => "zhihu",
            Platform::Bilibili => "bilibili",
            Platform::Douyin => "douyin",
            Platform::Baidu => "baidu",
            Platform::Toutiao => "toutiao",
            Platform::Douban => "douban",
            Platform::Juejin => "juejin",
            Platform::Github => "github",
            Platform::V2ex => "v2ex",
        }
    }

    /// Comma-joined list of every key, for client-facing error messages.
    pub fn supported_keys() -> String {
        Self::ALL
            .iter()
            .map(|p| p.key())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Platform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|p| p.key() == s).ok_or(())
    }
}

/// One normalized trending entry from one platform.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct TrendItem {
    pub id: String,
    pub title: String,
    pub desc: Option<String>,
    pub url: String,
    pub hot: f64,
    pub cover: Option<String>,
    pub source: Platform,
    pub tag: Option<String>,
    pub timestamp: i64, // unix millis, informational
}

/// Successful aggregation result, also the `/trends` response body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct TrendsPayload {
    pub items: Vec<TrendItem>,
    pub timestamp: i64,
    pub channels: Vec<Platform>,
}

/// One fetch strategy for one or more platforms (a mirror set, a public endpoint, a mock).
#[async_trait::async_trait]
pub trait TrendSource: Send + Sync {
    async fn fetch(&self, platform: Platform) -> Result<Vec<TrendItem>, UpstreamError>;
    fn name(&self) -> &'static str;
    /// Upper bound on sequential upstream calls one `fetch` makes. The adapter's
    /// deadline for this source is the per-call timeout times this.
    fn upstream_calls(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_from_str() {
        for p in Platform::ALL {
            assert_eq!(p.key().parse::<Platform>(), Ok(p));
        }
        assert!("twitter".parse::<Platform>().is_err());
        assert!("Weibo".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_serializes_as_key() {
        let s = serde_json::to_string(&Platform::V2ex).unwrap();
        assert_eq!(s, r#""v2ex""#);
    }
}
