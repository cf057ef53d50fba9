//! Integration tests for the secondary routes: /health, /search, /settings, /summary.
//!
//! The summary provider is a fixed mock; settings and caches live in `MemoryKv`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt as _;

use trend_hub::cache::MemoryKv;
use trend_hub::config::AppConfig;
use trend_hub::error::UpstreamError;
use trend_hub::ingest::providers::SourceRegistry;
use trend_hub::ingest::types::{Platform, TrendItem, TrendSource};
use trend_hub::ingest::Aggregator;
use trend_hub::summary::MockSummarizer;
use trend_hub::{router, AppState};

struct Static(HashMap<Platform, Vec<TrendItem>>);

#[async_trait]
impl TrendSource for Static {
    async fn fetch(&self, platform: Platform) -> Result<Vec<TrendItem>, UpstreamError> {
        Ok(self.0.get(&platform).cloned().unwrap_or_default())
    }
    fn name(&self) -> &'static str {
        "static"
    }
}

fn item(source: Platform, title: &str, desc: Option<&str>, hot: f64) -> TrendItem {
    TrendItem {
        id: format!("{}_{}", source.key(), title),
        title: title.into(),
        desc: desc.map(str::to_string),
        url: "#".into(),
        hot,
        cover: None,
        source,
        tag: None,
        timestamp: 0,
    }
}

fn test_app(cfg: AppConfig) -> Router {
    let mut data = HashMap::new();
    data.insert(
        Platform::Github,
        vec![
            item(Platform::Github, "tokio-rs/axum", Some("web framework"), 50.0),
            item(Platform::Github, "serde-rs/json", Some("built on tokio? no"), 80.0),
            item(Platform::Github, "rust-lang/rust", None, 99.0),
        ],
    );
    let source: Arc<dyn TrendSource> = Arc::new(Static(data));
    let registry = SourceRegistry::new(20, Duration::from_secs(2))
        .with_chain(Platform::Github, vec![source]);
    let aggregator = Aggregator::new(registry, cfg.aggregate_settings());
    let summarizer = Arc::new(MockSummarizer {
        fixed: "一句话摘要".into(),
    });
    router(AppState::new(aggregator, Arc::new(MemoryKv::new()), summarizer, cfg))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot")
}

async fn json_of(resp: Response) -> Value {
    let bytes = body::to_bytes(resp.into_body(), 1_048_576)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn health_reports_status_and_version() {
    let app = test_app(AppConfig::default());
    let resp = send(&app, "GET", "/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_of(resp).await;
    assert_eq!(v["status"], "ok");
    assert!(v["timestamp"].as_i64().is_some());
    assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn search_requires_a_query() {
    let app = test_app(AppConfig::default());
    let resp = send(&app, "GET", "/search?q=%20%20", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_of(resp).await["error"].is_string());
}

#[tokio::test]
async fn search_without_snapshot_is_empty_with_message() {
    let app = test_app(AppConfig::default());
    let resp = send(&app, "GET", "/search?q=tokio&channels=github", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_of(resp).await;
    assert_eq!(v["items"], json!([]));
    assert_eq!(v["query"], "tokio");
    assert!(v["message"].is_string());
}

#[tokio::test]
async fn search_reads_the_last_aggregation() {
    let app = test_app(AppConfig::default());
    let resp = send(&app, "GET", "/trends?channels=github", None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_of(send(&app, "GET", "/search?q=TOKIO&channels=github", None).await).await;
    let titles: Vec<_> = v["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|i| i["title"].as_str())
        .collect();
    // Title match first, then desc-only match.
    assert_eq!(titles, vec!["tokio-rs/axum", "serde-rs/json"]);
    assert_eq!(v["total"], 2);
}

#[tokio::test]
async fn narrow_trends_request_does_not_hide_search_hits() {
    let app = test_app(AppConfig::default());
    let wide = send(&app, "GET", "/trends?channels=github", None).await;
    assert_eq!(wide.status(), StatusCode::OK);
    let narrow = json_of(send(&app, "GET", "/trends?channels=github&limit=1", None).await).await;
    assert_eq!(narrow["items"][0]["title"], "rust-lang/rust");

    let v = json_of(send(&app, "GET", "/search?q=tokio&channels=github", None).await).await;
    assert_eq!(v["total"], 2);
}

#[tokio::test]
async fn search_rejects_post() {
    let app = test_app(AppConfig::default());
    let resp = send(&app, "POST", "/search?q=x", Some(json!({}))).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn settings_round_trip_masks_the_key() {
    let app = test_app(AppConfig::default());

    let resp = send(&app, "GET", "/settings", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let v = json_of(send(&app, "GET", "/settings?userId=u1", None).await).await;
    assert_eq!(v["hasApiKey"], false);
    assert!(v["qwenApiKey"].is_null());

    let resp = send(
        &app,
        "POST",
        "/settings?userId=u1",
        Some(json!({ "qwenApiKey": "sk-secret", "channels": ["weibo"] })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_of(resp).await["success"], true);

    let v = json_of(send(&app, "GET", "/settings?userId=u1", None).await).await;
    assert_eq!(v["qwenApiKey"], "******");
    assert_eq!(v["hasApiKey"], true);
    assert_eq!(v["channels"], json!(["weibo"]));
    assert!(v["updatedAt"].is_i64());
}

#[tokio::test]
async fn settings_rejects_non_object_and_other_methods() {
    let app = test_app(AppConfig::default());
    let resp = send(&app, "POST", "/settings?userId=u1", Some(json!("nope"))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, "PUT", "/settings?userId=u1", Some(json!({}))).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_of(resp).await["error"], "method not allowed");
}

#[tokio::test]
async fn summary_validates_input_and_key() {
    let app = test_app(AppConfig::default());

    let resp = send(&app, "POST", "/summary", Some(json!({ "title": "t" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // No key in settings and none configured.
    let resp = send(
        &app,
        "POST",
        "/summary",
        Some(json!({ "userId": "u2", "title": "台风登陆广东" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, "GET", "/summary", None).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn summary_uses_user_key_and_caches() {
    let app = test_app(AppConfig::default());
    let _ = send(
        &app,
        "POST",
        "/settings?userId=u3",
        Some(json!({ "qwenApiKey": "sk-user" })),
    )
    .await;

    let req = json!({ "userId": "u3", "title": "台风登陆广东", "content": "强台风" });
    let first = json_of(send(&app, "POST", "/summary", Some(req.clone())).await).await;
    assert_eq!(first["summary"], "一句话摘要");
    assert_eq!(first["model"], "mock");
    assert_eq!(first["cached"], false);

    let second = json_of(send(&app, "POST", "/summary", Some(req)).await).await;
    assert_eq!(second["cached"], true);
}

#[tokio::test]
async fn summary_falls_back_to_configured_key() {
    let mut cfg = AppConfig::default();
    cfg.summary.api_key = Some("sk-service".into());
    let app = test_app(cfg);

    let resp = send(
        &app,
        "POST",
        "/summary",
        Some(json!({ "userId": "anyone", "title": "高考放榜" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}
