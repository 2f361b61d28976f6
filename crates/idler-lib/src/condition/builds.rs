//! Build activity

use super::{async_trait, is_recent, Condition};
use crate::models::User;
use anyhow::Result;
use std::time::Duration;

/// Active while a build runs, or while the last finished build is younger
/// than the threshold
pub struct BuildCondition {
    idle_after: Duration,
}

impl BuildCondition {
    pub fn new(idle_after: Duration) -> Self {
        Self { idle_after }
    }
}

#[async_trait]
impl Condition for BuildCondition {
    async fn eval(&self, user: &User) -> Result<bool> {
        if let Some(build) = &user.active_build {
            if build.phase.in_progress() {
                return Ok(true);
            }
        }

        Ok(user
            .done_build
            .as_ref()
            .and_then(|b| b.last_activity())
            .map(|t| is_recent(t, self.idle_after))
            .unwrap_or(false))
    }
}
