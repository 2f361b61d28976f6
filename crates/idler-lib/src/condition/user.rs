//! End-user activity as seen by the Jenkins proxy

use super::{async_trait, is_recent, Condition};
use crate::models::User;
use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Namespace statistics reported by the proxy
#[derive(Debug, Deserialize)]
struct ProxyInfo {
    /// Unix seconds of the last request routed to the namespace
    last_visit: i64,
}

/// Active if the proxy routed end-user traffic to the namespace within the threshold
pub struct UserCondition {
    client: Client,
    base_url: Url,
    idle_after: Duration,
}

impl UserCondition {
    /// HTTP client for proxy queries, shared by every user condition
    pub fn http_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")
    }

    pub fn new(client: Client, proxy_url: &str, idle_after: Duration) -> Result<Self> {
        let mut base = proxy_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context("Invalid proxy URL")?;

        Ok(Self {
            client,
            base_url,
            idle_after,
        })
    }
}

#[async_trait]
impl Condition for UserCondition {
    async fn eval(&self, user: &User) -> Result<bool> {
        let url = self
            .base_url
            .join(&format!("api/info/{}", user.namespace()))
            .context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to query proxy")?;

        // The proxy has never routed traffic to this namespace
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Proxy error ({}): {}", status, body);
        }

        let info: ProxyInfo = response
            .json()
            .await
            .context("Failed to parse proxy response")?;

        let last_visit = Utc
            .timestamp_opt(info.last_visit, 0)
            .single()
            .context("Invalid last_visit timestamp")?;

        Ok(is_recent(last_visit, self.idle_after))
    }
}
