// src/ingest/normalize.rs
//! Raw upstream record → `TrendItem`.
//!
//! Upstream schemas drift, so every field is looked up through an ordered list of
//! candidate paths (`FieldMap`). A candidate counts only if it is "present": non-null,
//! non-empty string, non-zero number or `true`.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::ingest::types::{Platform, TrendItem};

pub const URL_PLACEHOLDER: &str = "#";
const TITLE_MAX_CHARS: usize = 300;

/// How to derive an item URL. Rules are tried in order.
#[derive(Debug, Clone, Copy)]
pub enum UrlRule {
    /// Use the field value as-is.
    Field(&'static str),
    /// `prefix + field` (e.g. an id or bvid appended to a base link).
    Prefixed {
        field: &'static str,
        prefix: &'static str,
    },
    /// Search link built from the normalized title: `base?param=<title>`.
    TitleSearch {
        base: &'static str,
        param: &'static str,
    },
    /// Constant link.
    Fixed(&'static str),
}

/// Candidate paths per canonical field. Paths are dotted; numeric segments index arrays.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub title: &'static [&'static str],
    pub url: &'static [UrlRule],
    pub desc: &'static [&'static str],
    pub hot: &'static [&'static str],
    pub cover: &'static [&'static str],
    pub tag: &'static [&'static str],
}

/// Field layout of the DailyHot aggregator API.
pub const DAILY_HOT_FIELDS: FieldMap = FieldMap {
    title: &["title"],
    url: &[UrlRule::Field("url"), UrlRule::Field("mobileUrl")],
    desc: &["desc", "description"],
    hot: &["hot", "hotValue"],
    cover: &["pic", "cover"],
    tag: &["label"],
};

/// Map one raw record. Returns `None` when no usable title remains.
pub fn normalize(
    platform: Platform,
    raw: &Value,
    index: usize,
    fields: &FieldMap,
) -> Option<TrendItem> {
    let title = first_string(raw, fields.title)
        .map(|t| normalize_title(&t))
        .unwrap_or_default();
    if title.is_empty() {
        return None;
    }

    let url = resolve_url(raw, &title, fields.url);
    let id_url = url
        .clone()
        .unwrap_or_else(|| format!("{}_{}", platform.key(), index));

    let hot = first_present(raw, fields.hot)
        .map(to_hot_number)
        .unwrap_or(0.0);

    Some(TrendItem {
        id: stable_id(platform, &title, &id_url),
        desc: first_string(raw, fields.desc).map(|d| normalize_title(&d)).filter(|d| !d.is_empty()),
        url: url.unwrap_or_else(|| URL_PLACEHOLDER.to_string()),
        hot,
        cover: first_string(raw, fields.cover),
        source: platform,
        tag: first_string(raw, fields.tag),
        timestamp: chrono::Utc::now().timestamp_millis(),
        title,
    })
}

/// Coerce a popularity value into a finite, non-negative number.
///
/// Numbers pass through; strings lose `,`, `_` and whitespace and yield their first
/// integer/decimal run; anything else is `0`.
pub fn to_hot_number(v: &Value) -> f64 {
    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    let n = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let re = RE_NUM.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex"));
            let compact: String = s
                .chars()
                .filter(|c| !matches!(c, ',' | '_') && !c.is_whitespace())
                .collect();
            re.find(&compact)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
        }
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}

/// `"{platform}_{hex}"` where hex is FNV-1a/32 over the UTF-16 units of `"{title}#{url}"`.
///
/// UTF-16 keeps ids identical to the ones already persisted by web clients.
pub fn stable_id(platform: Platform, title: &str, url: &str) -> String {
    let key = format!("{title}#{url}");
    format!("{}_{:x}", platform.key(), fnv1a32_utf16(&key))
}

fn fnv1a32_utf16(s: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for unit in s.encode_utf16() {
        h ^= u32::from(unit);
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

/// Title cleanup: decode entities, strip tags, collapse whitespace, trim, cap length.
pub fn normalize_title(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();

    let decoded = html_escape::decode_html_entities(s);
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    let stripped = re_tags.replace_all(&decoded, "");
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    let out = re_ws.replace_all(&stripped, " ");
    let out = out.trim();

    if out.chars().count() > TITLE_MAX_CHARS {
        out.chars().take(TITLE_MAX_CHARS).collect()
    } else {
        out.to_string()
    }
}

/// Dotted-path lookup; `"data.cards.0.content"` walks objects and arrays.
pub fn lookup<'a>(v: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(v, |cur, seg| match cur {
        Value::Object(map) => map.get(seg),
        Value::Array(arr) => seg.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    })
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn first_present<'a>(v: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|p| lookup(v, p))
        .find(|x| is_present(x))
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(v: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|p| lookup(v, p))
        .filter(|x| is_present(x))
        .find_map(scalar_string)
}

fn resolve_url(raw: &Value, title: &str, rules: &[UrlRule]) -> Option<String> {
    rules.iter().find_map(|rule| match *rule {
        UrlRule::Field(path) => first_string(raw, &[path]),
        UrlRule::Prefixed { field, prefix } => {
            first_string(raw, &[field]).map(|v| format!("{prefix}{v}"))
        }
        UrlRule::TitleSearch { base, param } => reqwest::Url::parse_with_params(base, &[(param, title)])
            .ok()
            .map(String::from),
        UrlRule::Fixed(url) => Some(url.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hot_from_numbers_and_strings() {
        assert_eq!(to_hot_number(&json!(1234)), 1234.0);
        assert_eq!(to_hot_number(&json!(12.5)), 12.5);
        assert_eq!(to_hot_number(&json!("1,234,567")), 1_234_567.0);
        assert_eq!(to_hot_number(&json!("热度 98.6 万")), 98.6);
        assert_eq!(to_hot_number(&json!("1_000 views")), 1000.0);
        assert_eq!(to_hot_number(&json!("n/a")), 0.0);
        assert_eq!(to_hot_number(&json!(null)), 0.0);
        assert_eq!(to_hot_number(&json!(true)), 0.0);
        assert_eq!(to_hot_number(&json!(-5)), 0.0);
    }

    #[test]
    fn title_less_records_are_dropped() {
        let raws = [
            json!({ "url": "https://x" }),
            json!({ "title": "   ", "url": "https://x" }),
            json!({ "title": "<b></b>" }),
            json!({ "title": null }),
        ];
        for (i, r) in raws.iter().enumerate() {
            assert!(normalize(Platform::Weibo, r, i, &DAILY_HOT_FIELDS).is_none());
        }
    }

    #[test]
    fn stable_id_is_deterministic() {
        let raw = json!({ "title": "台风登陆广东", "url": "https://s.weibo.com/x", "hot": "12,000" });
        let a = normalize(Platform::Weibo, &raw, 0, &DAILY_HOT_FIELDS).unwrap();
        let b = normalize(Platform::Weibo, &raw, 7, &DAILY_HOT_FIELDS).unwrap();
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("weibo_"));
        assert_eq!(a.hot, 12_000.0);

        let other = normalize(Platform::Zhihu, &raw, 0, &DAILY_HOT_FIELDS).unwrap();
        assert_ne!(a.id, other.id);
    }

    #[test]
    fn fnv_matches_reference_vectors() {
        assert_eq!(fnv1a32_utf16(""), 0x811c_9dc5);
        assert_eq!(fnv1a32_utf16("a"), 0xe40c_292c);
        assert_eq!(fnv1a32_utf16("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn missing_url_uses_placeholder_and_positional_id() {
        let raw = json!({ "title": "No link here" });
        let a = normalize(Platform::V2ex, &raw, 3, &DAILY_HOT_FIELDS).unwrap();
        let b = normalize(Platform::V2ex, &raw, 4, &DAILY_HOT_FIELDS).unwrap();
        assert_eq!(a.url, URL_PLACEHOLDER);
        assert_eq!(a.id, stable_id(Platform::V2ex, "No link here", "v2ex_3"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn candidates_follow_truthiness() {
        let raw = json!({
            "title": "T",
            "url": "",
            "mobileUrl": "https://m.example/t",
            "hot": 0,
            "hotValue": "3,000",
            "description": "d",
            "cover": "https://img",
        });
        let it = normalize(Platform::Baidu, &raw, 0, &DAILY_HOT_FIELDS).unwrap();
        assert_eq!(it.url, "https://m.example/t");
        assert_eq!(it.hot, 3000.0);
        assert_eq!(it.desc.as_deref(), Some("d"));
        assert_eq!(it.cover.as_deref(), Some("https://img"));
        assert_eq!(it.tag, None);
    }

    #[test]
    fn url_rules_cover_prefix_and_search() {
        const FIELDS: FieldMap = FieldMap {
            title: &["word"],
            url: &[
                UrlRule::Prefixed {
                    field: "target.id",
                    prefix: "https://q.example/",
                },
                UrlRule::TitleSearch {
                    base: "https://s.example/search",
                    param: "q",
                },
            ],
            desc: &[],
            hot: &[],
            cover: &[],
            tag: &[],
        };
        let with_id = json!({ "word": "a b", "target": { "id": 42 } });
        let it = normalize(Platform::Zhihu, &with_id, 0, &FIELDS).unwrap();
        assert_eq!(it.url, "https://q.example/42");

        let no_id = json!({ "word": "a b" });
        let it = normalize(Platform::Zhihu, &no_id, 0, &FIELDS).unwrap();
        assert_eq!(it.url, "https://s.example/search?q=a+b");
    }

    #[test]
    fn lookup_walks_arrays() {
        let v = json!({ "data": { "cards": [ { "content": [1, 2] } ] } });
        assert_eq!(lookup(&v, "data.cards.0.content.1"), Some(&json!(2)));
        assert_eq!(lookup(&v, "data.cards.1"), None);
        assert_eq!(lookup(&v, "data.cards.x"), None);
    }

    #[test]
    fn normalize_title_cleans_markup() {
        assert_eq!(normalize_title("  Hello&nbsp;<em>world</em>\n\t! "), "Hello world !");
        assert_eq!(normalize_title("a < b"), "a < b");
        assert!(normalize_title(&"x".repeat(1000)).chars().count() <= 300);
    }
}
