use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::cache::{trends_key, CacheLookup, KvStore, ResponseCache};
use crate::config::AppConfig;
use crate::error::{ApiError, SummaryError};
use crate::ingest::types::Platform;
use crate::ingest::{clamp_limit, parse_channels, Aggregator};
use crate::search::search_items;
use crate::settings::SettingsStore;
use crate::summary::{summarize_cached, DynSummarizer, SummaryInput};

const X_CACHE: &str = "x-cache";
const FALLBACK_CACHE_CONTROL: &str = "public, max-age=60, stale-while-revalidate=300";

#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<Aggregator>,
    cache: Arc<ResponseCache>,
    kv: Arc<dyn KvStore>,
    summarizer: DynSummarizer,
    settings: SettingsStore,
    config: Arc<AppConfig>,
    cache_control: HeaderValue,
}

impl AppState {
    pub fn new(
        aggregator: Aggregator,
        kv: Arc<dyn KvStore>,
        summarizer: DynSummarizer,
        config: AppConfig,
    ) -> Self {
        let fresh = Duration::from_secs(config.cache.fresh_ttl_secs);
        let stale = Duration::from_secs(config.cache.stale_ttl_secs);
        let cache_control = HeaderValue::try_from(format!(
            "public, max-age={}, stale-while-revalidate={}",
            fresh.as_secs(),
            stale.as_secs()
        ))
        .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CACHE_CONTROL));

        Self {
            aggregator: Arc::new(aggregator),
            cache: Arc::new(ResponseCache::new(kv.clone(), fresh, stale)),
            settings: SettingsStore::new(kv.clone()),
            kv,
            summarizer,
            config: Arc::new(config),
            cache_control,
        }
    }
}

/// All public routes. Every route answers unsupported methods with a JSON 405.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health).fallback(method_not_allowed))
        .route("/trends", get(trends).fallback(method_not_allowed))
        .route("/search", get(search).fallback(method_not_allowed))
        .route("/summary", post(summary).fallback(method_not_allowed))
        .route(
            "/settings",
            get(get_settings)
                .post(post_settings)
                .fallback(method_not_allowed),
        )
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn param<'a>(q: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    q.get(name).map(String::as_str)
}

fn cached_json(body: String, cache_state: &'static str, cache_control: &HeaderValue) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (HeaderName::from_static(X_CACHE), HeaderValue::from_static(cache_state)),
            (header::CACHE_CONTROL, cache_control.clone()),
        ],
        body,
    )
        .into_response()
}

async fn trends(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let channels = parse_channels(param(&q, "channels"))?;
    let limit = clamp_limit(
        param(&q, "limit"),
        state.config.aggregate.default_limit,
        state.config.aggregate.max_limit,
    );
    let bypass = matches!(param(&q, "fresh"), Some("1") | Some("true"));
    let key = trends_key(&channels, limit);

    if !bypass {
        match state.cache.lookup(&key).await {
            CacheLookup::Fresh(body) => {
                tracing::debug!(target: "api", key = %key, "trends served from cache");
                return Ok(cached_json(body, "HIT", &state.cache_control));
            }
            CacheLookup::Stale(body) => {
                spawn_revalidate(state.clone(), channels, limit, key);
                return Ok(cached_json(body, "STALE", &state.cache_control));
            }
            CacheLookup::Miss => {}
        }
    }

    let body = refresh(&state, &channels, limit, &key).await?;
    Ok(cached_json(body, "MISS", &state.cache_control))
}

/// Aggregate live, then write the response cache and the search snapshot.
async fn refresh(
    state: &AppState,
    channels: &[Platform],
    limit: usize,
    key: &str,
) -> Result<String, ApiError> {
    let payload = state.aggregator.aggregate(channels, limit).await?;
    let body = serde_json::to_string(&payload).map_err(|e| ApiError::Internal(e.to_string()))?;
    state.cache.store(key, body.clone()).await;
    state.cache.store_snapshot(channels, limit, &payload.items).await;
    Ok(body)
}

fn spawn_revalidate(state: AppState, channels: Vec<Platform>, limit: usize, key: String) {
    if !state.cache.begin_revalidate(&key) {
        return;
    }
    tokio::spawn(async move {
        match refresh(&state, &channels, limit, &key).await {
            Ok(_) => tracing::debug!(target: "cache", key = %key, "stale entry refreshed"),
            Err(e) => tracing::warn!(target: "cache", key = %key, error = %e, "background refresh failed"),
        }
        state.cache.end_revalidate(&key);
    });
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let query = param(&q, "q").map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query parameter `q` is required".into()));
    }
    let channels = parse_channels(param(&q, "channels"))?;

    let Some(items) = state.cache.load_snapshot(&channels).await else {
        return Ok(Json(json!({
            "items": [],
            "query": query,
            "message": "no cached trends yet; load /trends first",
        })));
    };

    let outcome = search_items(&items, query);
    tracing::debug!(target: "api", query, total = outcome.total, "search served");
    Ok(Json(json!({
        "items": outcome.items,
        "query": query,
        "total": outcome.total,
        "timestamp": chrono::Utc::now().timestamp_millis(),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRequest {
    user_id: Option<String>,
    title: Option<String>,
    content: Option<String>,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn summary(
    State(state): State<AppState>,
    body: Result<Json<SummaryRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (Some(user_id), Some(title)) = (non_blank(req.user_id), non_blank(req.title)) else {
        return Err(ApiError::BadRequest("`userId` and `title` are required".into()));
    };

    let api_key = match state.settings.api_key(&user_id).await {
        Some(k) => k,
        None => state
            .config
            .summary
            .api_key
            .clone()
            .ok_or(SummaryError::MissingApiKey)?,
    };

    let input = SummaryInput {
        api_key: &api_key,
        title: &title,
        content: req.content.as_deref(),
    };
    let ttl = Duration::from_secs(state.config.summary.cache_ttl_secs);
    let (text, cached) =
        summarize_cached(state.kv.as_ref(), state.summarizer.as_ref(), input, ttl).await?;

    Ok(Json(json!({
        "summary": text,
        "model": state.summarizer.model(),
        "cached": cached,
        "timestamp": chrono::Utc::now().timestamp_millis(),
    })))
}

fn require_user(q: &HashMap<String, String>) -> Result<&str, ApiError> {
    param(q, "userId")
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("`userId` is required".into()))
}

async fn get_settings(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let user = require_user(&q)?;
    Ok(Json(state.settings.get_masked(user).await?))
}

async fn post_settings(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let user = require_user(&q)?;
    let Json(patch) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state.settings.merge(user, patch).await?;
    tracing::info!(target: "api", user, "settings updated");
    Ok(Json(json!({ "success": true, "message": "settings saved" })))
}
