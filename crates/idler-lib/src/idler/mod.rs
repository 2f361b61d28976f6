//! Idle control
//!
//! [`UserIdler`] is the per-user control loop; [`IdlerSupervisor`] owns one
//! of them per monitored user and routes user events to it.

mod supervisor;
mod user_idler;


pub use supervisor::IdlerSupervisor;
pub use user_idler::{UserIdler, USER_CHANNEL_CAPACITY};

use std::time::Duration;

/// Settings shared by every user idler
#[derive(Debug, Clone)]
pub struct IdlerConfig {
    /// Maximum idle (resp. unidle) attempts per quiet interval
    pub max_retries: u32,
    /// Inactivity after which a namespace may be idled
    pub idle_after: Duration,
    /// Fallback evaluation period when no events arrive
    pub check_idle: Duration,
    /// Period after which retry counters are reset
    pub max_retries_quiet_interval: Duration,
    /// Jenkins proxy URL; enables the end-user activity condition
    pub proxy_url: Option<String>,
}

impl Default for IdlerConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            idle_after: Duration::from_secs(45 * 60),
            check_idle: Duration::from_secs(15 * 60),
            max_retries_quiet_interval: Duration::from_secs(30 * 60),
            proxy_url: None,
        }
    }
}
