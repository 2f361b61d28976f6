//! Core data models for the idler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to a user name to form the Jenkins namespace
pub const JENKINS_NAMESPACE_SUFFIX: &str = "-jenkins";

/// Service whose deployment config is queried for the Jenkins state
pub const JENKINS_SERVICE_NAME: &str = "jenkins";

/// Services idled and unidled together, in this order
pub const JENKINS_SERVICES: [&str; 2] = ["jenkins", "content-repository"];

/// A monitored user together with the latest activity snapshot of its namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_build: Option<Build>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_build: Option<Build>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jenkins_last_update: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Namespace hosting this user's Jenkins instance
    pub fn namespace(&self) -> String {
        format!("{}{}", self.name, JENKINS_NAMESPACE_SUFFIX)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let build = |b: &Option<Build>| {
            b.as_ref()
                .map(|b| format!("{}({:?})", b.name, b.phase))
                .unwrap_or_else(|| "-".to_string())
        };
        let last_update = self
            .jenkins_last_update
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());

        write!(
            f,
            "User{{id: {}, name: {}, active_build: {}, done_build: {}, jenkins_last_update: {}}}",
            self.id,
            self.name,
            build(&self.active_build),
            build(&self.done_build),
            last_update
        )
    }
}

/// Build phases as reported by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildPhase {
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
}

impl BuildPhase {
    /// Returns true while the build still occupies the Jenkins instance
    pub fn in_progress(&self) -> bool {
        matches!(self, BuildPhase::New | BuildPhase::Pending | BuildPhase::Running)
    }
}

/// A single build execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub name: String,
    pub phase: BuildPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<DateTime<Utc>>,
}

impl Build {
    /// Latest point in time this build is known to have been active
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.completion_timestamp.or(self.start_timestamp)
    }
}

/// Current state of a Jenkins deployment.
///
/// Values are ordered so that `state > JenkinsState::Idled` means "not idled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum JenkinsState {
    Unknown = -1,
    Idled = 0,
    Starting = 1,
    Running = 2,
}

impl fmt::Display for JenkinsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JenkinsState::Unknown => "unknown",
            JenkinsState::Idled => "idled",
            JenkinsState::Starting => "starting",
            JenkinsState::Running => "running",
        };
        f.write_str(s)
    }
}
