//! OpenShift boundary
//!
//! The idler only needs three primitives from the cluster: query whether a
//! service is idled, idle it and unidle it.

mod client;

pub use client::RestOpenShiftClient;

use crate::models::JenkinsState;
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for the remote idle API
#[async_trait]
pub trait OpenShiftClient: Send + Sync {
    /// Current state of `service` in `namespace`
    async fn is_idle(
        &self,
        api_url: &str,
        bearer_token: &str,
        namespace: &str,
        service: &str,
    ) -> Result<JenkinsState>;

    /// Scale `service` down to zero
    async fn idle(
        &self,
        api_url: &str,
        bearer_token: &str,
        namespace: &str,
        service: &str,
    ) -> Result<()>;

    /// Scale `service` back up
    async fn unidle(
        &self,
        api_url: &str,
        bearer_token: &str,
        namespace: &str,
        service: &str,
    ) -> Result<()>;
}
