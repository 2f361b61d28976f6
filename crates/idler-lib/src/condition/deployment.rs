//! Deployment config activity

use super::{async_trait, is_recent, Condition};
use crate::models::User;
use anyhow::Result;
use std::time::Duration;

/// Active if the Jenkins deployment config changed within the threshold
pub struct DeploymentCondition {
    idle_after: Duration,
}

impl DeploymentCondition {
    pub fn new(idle_after: Duration) -> Self {
        Self { idle_after }
    }
}

#[async_trait]
impl Condition for DeploymentCondition {
    async fn eval(&self, user: &User) -> Result<bool> {
        Ok(user
            .jenkins_last_update
            .map(|t| is_recent(t, self.idle_after))
            .unwrap_or(false))
    }
}
