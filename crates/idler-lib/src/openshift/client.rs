//! REST client for OpenShift deployment configs

use super::{async_trait, OpenShiftClient};
use crate::models::JenkinsState;
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Subset of a DeploymentConfig needed to derive the Jenkins state
#[derive(Debug, Deserialize)]
struct DeploymentConfig {
    #[serde(default)]
    spec: DeploymentConfigSpec,
    #[serde(default)]
    status: DeploymentConfigStatus,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentConfigSpec {
    #[serde(default)]
    replicas: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentConfigStatus {
    #[serde(default)]
    ready_replicas: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Scale {
    kind: &'static str,
    api_version: &'static str,
    metadata: serde_json::Value,
    spec: serde_json::Value,
}

/// OpenShift client talking to the `oapi/v1` deployment config endpoints
pub struct RestOpenShiftClient {
    client: Client,
}

impl RestOpenShiftClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    fn dc_url(api_url: &str, namespace: &str, service: &str, suffix: &str) -> Result<Url> {
        let mut base = api_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).context("Invalid API URL")?;

        base.join(&format!(
            "oapi/v1/namespaces/{}/deploymentconfigs/{}{}",
            namespace, service, suffix
        ))
        .context("Invalid path")
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        Ok(response)
    }

    async fn scale(
        &self,
        api_url: &str,
        bearer_token: &str,
        namespace: &str,
        service: &str,
        replicas: i32,
    ) -> Result<()> {
        let url = Self::dc_url(api_url, namespace, service, "/scale")?;
        let body = Scale {
            kind: "Scale",
            api_version: "extensions/v1beta1",
            metadata: json!({ "name": service, "namespace": namespace }),
            spec: json!({ "replicas": replicas }),
        };

        debug!(namespace = %namespace, service = %service, replicas, "Scaling deployment config");

        Self::send(self.client.put(url).bearer_auth(bearer_token).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl OpenShiftClient for RestOpenShiftClient {
    async fn is_idle(
        &self,
        api_url: &str,
        bearer_token: &str,
        namespace: &str,
        service: &str,
    ) -> Result<JenkinsState> {
        let url = Self::dc_url(api_url, namespace, service, "")?;
        let response = Self::send(self.client.get(url).bearer_auth(bearer_token)).await?;

        let dc: DeploymentConfig = response
            .json()
            .await
            .context("Failed to parse deployment config")?;

        let state = if dc.spec.replicas == 0 {
            JenkinsState::Idled
        } else if dc.status.ready_replicas >= 1 {
            JenkinsState::Running
        } else {
            JenkinsState::Starting
        };

        Ok(state)
    }

    async fn idle(
        &self,
        api_url: &str,
        bearer_token: &str,
        namespace: &str,
        service: &str,
    ) -> Result<()> {
        self.scale(api_url, bearer_token, namespace, service, 0).await
    }

    async fn unidle(
        &self,
        api_url: &str,
        bearer_token: &str,
        namespace: &str,
        service: &str,
    ) -> Result<()> {
        self.scale(api_url, bearer_token, namespace, service, 1).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const DC_PATH: &str = "/oapi/v1/namespaces/alice-jenkins/deploymentconfigs/jenkins";

    async fn state_for(body: &str) -> JenkinsState {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", DC_PATH)
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = RestOpenShiftClient::new().unwrap();
        client
            .is_idle(&server.url(), "secret", "alice-jenkins", "jenkins")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_is_idle_idled() {
        let state = state_for(r#"{"spec": {"replicas": 0}, "status": {}}"#).await;
        assert_eq!(state, JenkinsState::Idled);
    }

    #[tokio::test]
    async fn test_is_idle_starting() {
        let state = state_for(r#"{"spec": {"replicas": 1}, "status": {"readyReplicas": 0}}"#).await;
        assert_eq!(state, JenkinsState::Starting);
    }

    #[tokio::test]
    async fn test_is_idle_running() {
        let state = state_for(r#"{"spec": {"replicas": 1}, "status": {"readyReplicas": 1}}"#).await;
        assert_eq!(state, JenkinsState::Running);
    }

    #[tokio::test]
    async fn test_is_idle_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", DC_PATH)
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let client = RestOpenShiftClient::new().unwrap();
        let err = client
            .is_idle(&server.url(), "secret", "alice-jenkins", "jenkins")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_idle_scales_to_zero() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", format!("{}/scale", DC_PATH).as_str())
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({ "spec": { "replicas": 0 } })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = RestOpenShiftClient::new().unwrap();
        client
            .idle(&server.url(), "secret", "alice-jenkins", "jenkins")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unidle_scales_to_one() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", format!("{}/scale", DC_PATH).as_str())
            .match_body(Matcher::PartialJson(json!({ "spec": { "replicas": 1 } })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = RestOpenShiftClient::new().unwrap();
        client
            .unidle(&server.url(), "secret", "alice-jenkins", "jenkins")
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
