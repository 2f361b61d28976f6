//! Idler configuration

use anyhow::{Context, Result};
use idler_lib::IdlerConfig;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Idler configuration, read from `JC_*` environment variables
#[derive(Clone, Deserialize)]
pub struct Config {
    /// OpenShift API endpoint
    #[serde(default)]
    pub openshift_api_url: String,

    /// Bearer token used against the OpenShift API
    #[serde(default)]
    pub openshift_token: String,

    /// Jenkins proxy endpoint; enables the end-user activity condition
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Maximum idle/unidle attempts per quiet interval
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minutes of inactivity after which Jenkins is idled
    #[serde(default = "default_idle_after")]
    pub idle_after_minutes: u64,

    /// Minutes between time based idle checks
    #[serde(default = "default_check_idle")]
    pub check_idle_minutes: u64,

    /// Minutes after which retry counters are reset
    #[serde(default = "default_quiet_interval")]
    pub max_retries_quiet_interval_minutes: u64,

    /// Comma separated user ids the idler is enabled for
    #[serde(default)]
    pub fixed_uuids: String,

    /// API server port for health/metrics/events
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_max_retries() -> u32 {
    10
}

fn default_idle_after() -> u64 {
    45
}

fn default_check_idle() -> u64 {
    15
}

fn default_quiet_interval() -> u64 {
    30
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("JC"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Collect every invalid setting
    pub fn verify(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.openshift_api_url.trim().is_empty() {
            problems.push("value for JC_OPENSHIFT_API_URL must be set".to_string());
        } else if let Err(e) = check_url(&self.openshift_api_url) {
            problems.push(format!("value for JC_OPENSHIFT_API_URL is invalid: {}", e));
        }
        if self.openshift_token.trim().is_empty() {
            problems.push("value for JC_OPENSHIFT_TOKEN must be set".to_string());
        }
        if let Some(proxy_url) = self.proxy_url.as_deref().filter(|u| !u.is_empty()) {
            if let Err(e) = check_url(proxy_url) {
                problems.push(format!("value for JC_PROXY_URL is invalid: {}", e));
            }
        }

        for (var, value) in self.intervals() {
            if value == 0 {
                problems.push(format!("value for {} must be positive", var));
            } else if let Err(e) = minutes(var, value) {
                problems.push(e.to_string());
            }
        }

        problems
    }

    /// User ids listed in `fixed_uuids`
    pub fn fixed_uuids(&self) -> Vec<String> {
        self.fixed_uuids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Settings handed to every user idler
    pub fn idler_config(&self) -> Result<IdlerConfig> {
        Ok(IdlerConfig {
            max_retries: self.max_retries,
            idle_after: minutes("JC_IDLE_AFTER_MINUTES", self.idle_after_minutes)?,
            check_idle: minutes("JC_CHECK_IDLE_MINUTES", self.check_idle_minutes)?,
            max_retries_quiet_interval: minutes(
                "JC_MAX_RETRIES_QUIET_INTERVAL_MINUTES",
                self.max_retries_quiet_interval_minutes,
            )?,
            proxy_url: self.proxy_url.clone().filter(|u| !u.is_empty()),
        })
    }

    /// Interval settings in minutes, keyed by environment variable
    fn intervals(&self) -> [(&'static str, u64); 3] {
        [
            ("JC_IDLE_AFTER_MINUTES", self.idle_after_minutes),
            ("JC_CHECK_IDLE_MINUTES", self.check_idle_minutes),
            (
                "JC_MAX_RETRIES_QUIET_INTERVAL_MINUTES",
                self.max_retries_quiet_interval_minutes,
            ),
        ]
    }
}

/// Minutes as a `Duration`, rejecting values whose seconds overflow `u64`
fn minutes(var: &str, m: u64) -> Result<Duration> {
    m.checked_mul(60)
        .map(Duration::from_secs)
        .with_context(|| format!("value for {} is too large: {} minutes", var, m))
}

/// Parse an HTTP(S) endpoint the way the API clients do
fn check_url(value: &str) -> Result<Url> {
    let url = Url::parse(value.trim()).context("not a valid URL")?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("unsupported scheme '{}'", url.scheme());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            openshift_api_url: "https://api.cluster.example.com".to_string(),
            openshift_token: "token".to_string(),
            proxy_url: None,
            max_retries: default_max_retries(),
            idle_after_minutes: default_idle_after(),
            check_idle_minutes: default_check_idle(),
            max_retries_quiet_interval_minutes: default_quiet_interval(),
            fixed_uuids: String::new(),
            api_port: default_api_port(),
        }
    }

    #[test]
    fn test_valid_config_has_no_problems() {
        assert!(valid().verify().is_empty());
    }

    #[test]
    fn test_verify_reports_every_problem() {
        let mut config = valid();
        config.openshift_api_url = String::new();
        config.openshift_token = " ".to_string();
        config.check_idle_minutes = 0;

        let problems = config.verify();
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("JC_OPENSHIFT_API_URL"));
    }

    #[test]
    fn test_verify_rejects_invalid_urls() {
        let mut config = valid();
        config.proxy_url = Some("not a url".to_string());
        let problems = config.verify();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("JC_PROXY_URL"));

        config.proxy_url = Some("proxy:9091".to_string());
        assert_eq!(config.verify().len(), 1);

        config.proxy_url = Some("http://proxy:9091".to_string());
        config.openshift_api_url = "api.cluster.example.com".to_string();
        let problems = config.verify();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("JC_OPENSHIFT_API_URL"));
    }

    #[test]
    fn test_verify_rejects_overflowing_minutes() {
        let mut config = valid();
        config.idle_after_minutes = u64::MAX;

        let problems = config.verify();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("JC_IDLE_AFTER_MINUTES"));
        assert!(config.idler_config().is_err());
    }

    #[test]
    fn test_fixed_uuids_parsing() {
        let mut config = valid();
        config.fixed_uuids = " a1, b2,,c3 ".to_string();
        assert_eq!(config.fixed_uuids(), vec!["a1", "b2", "c3"]);
    }

    #[test]
    fn test_idler_config_conversion() {
        let mut config = valid();
        config.proxy_url = Some(String::new());

        let idler = config.idler_config().unwrap();
        assert_eq!(idler.max_retries, 10);
        assert_eq!(idler.idle_after, Duration::from_secs(45 * 60));
        assert_eq!(idler.check_idle, Duration::from_secs(15 * 60));
        assert_eq!(idler.max_retries_quiet_interval, Duration::from_secs(30 * 60));
        assert!(idler.proxy_url.is_none());
    }
}
