// src/ingest/config.rs
//! Static source configuration: platform → DailyHot endpoint + display name,
//! and the upstream mirror list (env overrides merged with configured defaults).

use crate::ingest::types::Platform;

pub const DEFAULT_HOT_API_BASES: &[&str] = &["https://api-hot.imsyy.top"];

/// Checked in order; the first one that is set wins.
const ENV_BASES: [&str; 2] = ["EDGE_TRENDHUB_HOT_API_BASES", "HOT_API_BASES"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformSpec {
    /// Path appended to each DailyHot base URL.
    pub endpoint: &'static str,
    pub name: &'static str,
}

pub fn platform_spec(platform: Platform) -> PlatformSpec {
    let (endpoint, name) = match platform {
        Platform::Weibo => ("/weibo", "微博"),
        Platform::Zhihu => ("/zhihu", "知乎"),
        Platform::Bilibili => ("/bilibili", "B站"),
        Platform::Douyin => ("/douyin", "抖音"),
        Platform::Baidu => ("/baidu", "百度"),
        Platform::Toutiao => ("/toutiao", "头条"),
        Platform::Douban => ("/douban-movie", "豆瓣"),
        Platform::Juejin => ("/juejin", "掘金"),
        Platform::Github => ("/github", "GitHub"),
        Platform::V2ex => ("/v2ex", "V2EX"),
    };
    PlatformSpec { endpoint, name }
}

/// Mirror list: env entries first, then `configured`, then built-in defaults.
pub fn hot_api_bases(configured: &[String]) -> Vec<String> {
    let raw = ENV_BASES
        .iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_default();
    merge_bases(&raw, configured)
}

fn merge_bases(env_raw: &str, configured: &[String]) -> Vec<String> {
    let from_env = env_raw.split(',').map(str::to_string);
    let defaults = DEFAULT_HOT_API_BASES.iter().map(|s| s.to_string());
    clean_list(from_env.chain(configured.iter().cloned()).chain(defaults))
}

/// Trim, drop empties and trailing slashes, de-duplicate keeping first occurrence.
fn clean_list<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim().trim_end_matches('/');
        if !t.is_empty() && !out.iter().any(|s| s == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn merge_keeps_order_and_dedups() {
        let cfg = vec!["https://b.example".to_string(), " ".to_string()];
        let out = merge_bases(
            " https://a.example/ ,https://b.example,,https://api-hot.imsyy.top",
            &cfg,
        );
        assert_eq!(
            out,
            vec![
                "https://a.example".to_string(),
                "https://b.example".to_string(),
                "https://api-hot.imsyy.top".to_string(),
            ]
        );
    }

    #[test]
    fn defaults_present_without_overrides() {
        let out = merge_bases("", &[]);
        assert_eq!(out, vec!["https://api-hot.imsyy.top".to_string()]);
    }

    #[serial_test::serial]
    #[test]
    fn env_override_is_tried_first() {
        env::remove_var("EDGE_TRENDHUB_HOT_API_BASES");
        env::set_var("HOT_API_BASES", "https://mirror.example");
        let out = hot_api_bases(&[]);
        assert_eq!(out.first().map(String::as_str), Some("https://mirror.example"));
        assert_eq!(out.len(), 2);
        env::remove_var("HOT_API_BASES");
    }

    #[test]
    fn douban_uses_movie_endpoint() {
        assert_eq!(platform_spec(Platform::Douban).endpoint, "/douban-movie");
        assert_eq!(platform_spec(Platform::Github).name, "GitHub");
    }
}
