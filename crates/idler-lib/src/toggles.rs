//! Feature toggles deciding which users may be idled

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Trait for feature toggle lookups
#[async_trait]
pub trait Features: Send + Sync {
    /// Whether the idler may idle the Jenkins instance of `user_id`
    async fn is_idler_enabled(&self, user_id: &str) -> Result<bool>;
}

/// Toggle enabled for a fixed list of user ids
#[derive(Debug, Clone, Default)]
pub struct FixedUuidToggle {
    uuids: HashSet<String>,
}

impl FixedUuidToggle {
    pub fn new<I, S>(uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uuids: uuids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uuids.is_empty()
    }
}

#[async_trait]
impl Features for FixedUuidToggle {
    async fn is_idler_enabled(&self, user_id: &str) -> Result<bool> {
        Ok(self.uuids.contains(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_uuid_toggle() {
        let toggle = FixedUuidToggle::new(["a1", "b2"]);

        assert!(toggle.is_idler_enabled("a1").await.unwrap());
        assert!(toggle.is_idler_enabled("b2").await.unwrap());
        assert!(!toggle.is_idler_enabled("c3").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_toggle_enables_nobody() {
        let toggle = FixedUuidToggle::default();

        assert!(toggle.is_empty());
        assert!(!toggle.is_idler_enabled("a1").await.unwrap());
    }
}
