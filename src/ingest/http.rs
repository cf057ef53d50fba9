// src/ingest/http.rs
use std::time::Duration;

use reqwest::header::{ACCEPT, REFERER};
use serde_json::Value;

use crate::error::UpstreamError;

pub const DEFAULT_USER_AGENT: &str = "trend-hub/0.1 (+https://github.com/trend-hub/trend-hub)";

/// Shared JSON GET client. Every call carries its own deadline; a timeout surfaces
/// as `UpstreamError::Timeout` and never affects sibling calls.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get_json(&self, url: &str, referer: Option<&str>) -> Result<Value, UpstreamError> {
        let mut req = self
            .client
            .get(url)
            .header(ACCEPT, "application/json,text/plain,*/*");
        if let Some(r) = referer {
            req = req.header(REFERER, r);
        }

        let call = async {
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(UpstreamError::Status(status.as_u16()));
            }
            let bytes = resp.bytes().await?;
            Ok::<Value, UpstreamError>(serde_json::from_slice(&bytes)?)
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(res) => res,
            Err(_) => Err(UpstreamError::Timeout),
        }
    }
}
