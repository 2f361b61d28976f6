//! Activity conditions
//!
//! A condition answers whether one activity dimension of a user's namespace
//! (builds, deployment changes, end-user traffic) has seen activity within its
//! configured threshold. [`Conditions`] combines a named set of them into a
//! single verdict.

mod builds;
mod conditions;
mod deployment;
mod multi_error;
mod user;


pub use builds::BuildCondition;
pub use conditions::Conditions;
pub use deployment::DeploymentCondition;
pub use multi_error::MultiError;
pub use user::UserCondition;

use crate::models::User;
use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;

pub use async_trait::async_trait;

/// Trait for activity checks
#[async_trait]
pub trait Condition: Send + Sync {
    /// Returns `Ok(true)` if activity was observed within the threshold.
    ///
    /// An error means activity could not be determined and must not be read
    /// as a vote to idle.
    async fn eval(&self, user: &User) -> Result<bool>;
}

/// Build the condition set used by every user idler.
///
/// The `user` condition is only registered when a proxy URL is configured.
/// It queries the proxy through `client`.
pub fn create_watch_conditions(
    client: &Client,
    proxy_url: Option<&str>,
    idle_after: Duration,
) -> Result<Conditions> {
    let mut conditions = Conditions::new();

    conditions.add("build", BuildCondition::new(idle_after));
    conditions.add("DC", DeploymentCondition::new(idle_after));

    if let Some(url) = proxy_url.filter(|u| !u.is_empty()) {
        tracing::debug!(proxy_url = %url, "Adding 'user' condition");
        conditions.add("user", UserCondition::new(client.clone(), url, idle_after)?);
    }

    Ok(conditions)
}

/// True if `timestamp` lies less than `threshold` in the past.
///
/// Timestamps in the future count as recent.
pub(crate) fn is_recent(timestamp: DateTime<Utc>, threshold: Duration) -> bool {
    match (Utc::now() - timestamp).to_std() {
        Ok(elapsed) => elapsed < threshold,
        Err(_) => true,
    }
}
