// src/settings.rs
//! Per-user settings blob stored in the KV collaborator under `settings:{userId}`.
//!
//! Only `qwenApiKey` is interpreted; every other field is opaque client state.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cache::KvStore;
use crate::error::ApiError;

const API_KEY_FIELD: &str = "qwenApiKey";
const MASK: &str = "******";

pub fn settings_key(user_id: &str) -> String {
    format!("settings:{}", user_id.trim())
}

#[derive(Clone)]
pub struct SettingsStore {
    kv: Arc<dyn KvStore>,
}

impl SettingsStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    async fn load_raw(&self, user_id: &str) -> Result<Map<String, Value>, ApiError> {
        match self.kv.get(&settings_key(user_id)).await {
            Ok(Some(Value::Object(map))) => Ok(map),
            Ok(_) => Ok(Map::new()),
            Err(e) => {
                tracing::error!(target: "api", error = ?e, "settings read failed");
                Err(ApiError::Internal("settings store unavailable".into()))
            }
        }
    }

    /// Stored settings with the API key masked, plus `hasApiKey`.
    pub async fn get_masked(&self, user_id: &str) -> Result<Value, ApiError> {
        let mut map = self.load_raw(user_id).await?;
        let has_key = map
            .get(API_KEY_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|k| !k.trim().is_empty());
        map.insert(
            API_KEY_FIELD.into(),
            if has_key {
                Value::String(MASK.into())
            } else {
                Value::Null
            },
        );
        map.insert("hasApiKey".into(), Value::Bool(has_key));
        Ok(Value::Object(map))
    }

    /// Shallow-merge `patch` into the stored object and stamp `updatedAt` (ms).
    ///
    /// A masked key sent back by a client does not overwrite the real one.
    pub async fn merge(&self, user_id: &str, patch: Value) -> Result<(), ApiError> {
        let Value::Object(patch) = patch else {
            return Err(ApiError::BadRequest("settings body must be a JSON object".into()));
        };
        let mut map = self.load_raw(user_id).await?;
        for (k, v) in patch {
            if k == API_KEY_FIELD && v.as_str() == Some(MASK) {
                continue;
            }
            map.insert(k, v);
        }
        map.insert(
            "updatedAt".into(),
            Value::from(chrono::Utc::now().timestamp_millis()),
        );
        self.kv
            .put(&settings_key(user_id), Value::Object(map), None)
            .await
            .map_err(|e| {
                tracing::error!(target: "api", error = ?e, "settings write failed");
                ApiError::Internal("settings store unavailable".into())
            })
    }

    /// Unmasked key for server-side use only. Store errors read as "no key".
    pub async fn api_key(&self, user_id: &str) -> Option<String> {
        let map = self.load_raw(user_id).await.ok()?;
        map.get(API_KEY_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}
