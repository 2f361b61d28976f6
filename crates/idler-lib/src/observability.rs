//! Observability infrastructure for the idler
//!
//! Provides:
//! - Prometheus metrics (actuation calls, failed checks, retry budget, dropped events)
//! - Per-user structured logging with tracing

use crate::models::User;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Histogram buckets for idle check latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<IdlerMetricsInner> = OnceLock::new();

struct IdlerMetricsInner {
    check_latency_seconds: Histogram,
    actuations: IntCounterVec,
    check_errors: IntCounterVec,
    retry_budget_exhausted: IntCounterVec,
    events_dropped: IntCounter,
    idlers_running: IntGauge,
}

impl IdlerMetricsInner {
    fn new() -> Self {
        Self {
            check_latency_seconds: register_histogram!(
                "jenkins_idler_check_latency_seconds",
                "Time spent in one idle check cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register check_latency_seconds"),

            actuations: register_int_counter_vec!(
                "jenkins_idler_actuations_total",
                "Idle and unidle calls issued against OpenShift",
                &["action", "result"]
            )
            .expect("Failed to register actuations"),

            check_errors: register_int_counter_vec!(
                "jenkins_idler_check_errors_total",
                "Idle check cycles that ended with an error",
                &["kind"]
            )
            .expect("Failed to register check_errors"),

            retry_budget_exhausted: register_int_counter_vec!(
                "jenkins_idler_retry_budget_exhausted_total",
                "Actions skipped because the retry budget was used up",
                &["action"]
            )
            .expect("Failed to register retry_budget_exhausted"),

            events_dropped: register_int_counter!(
                "jenkins_idler_events_dropped_total",
                "User events dropped because an idler queue was full"
            )
            .expect("Failed to register events_dropped"),

            idlers_running: register_int_gauge!(
                "jenkins_idler_user_idlers_running",
                "Number of user idlers currently running"
            )
            .expect("Failed to register idlers_running"),
        }
    }
}

/// Idler metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct IdlerMetrics {
    _private: (),
}

impl Default for IdlerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IdlerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(IdlerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &IdlerMetricsInner {
        GLOBAL_METRICS.get_or_init(IdlerMetricsInner::new)
    }

    pub fn observe_check_latency(&self, elapsed: Duration) {
        self.inner().check_latency_seconds.observe(elapsed.as_secs_f64());
    }

    /// Count one idle/unidle call and its outcome
    pub fn inc_actuation(&self, action: &str, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.inner()
            .actuations
            .with_label_values(&[action, result])
            .inc();
    }

    pub fn inc_check_error(&self, kind: &str) {
        self.inner().check_errors.with_label_values(&[kind]).inc();
    }

    pub fn inc_retry_budget_exhausted(&self, action: &str) {
        self.inner()
            .retry_budget_exhausted
            .with_label_values(&[action])
            .inc();
    }

    pub fn inc_events_dropped(&self) {
        self.inner().events_dropped.inc();
    }

    pub fn set_idlers_running(&self, count: i64) {
        self.inner().idlers_running.set(count);
    }
}

/// Structured logger owned by one user idler.
///
/// Every event carries the identity of the user it belongs to.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    username: String,
    user_id: String,
}

impl StructuredLogger {
    pub fn for_user(user: &User) -> Self {
        Self {
            username: user.name.clone(),
            user_id: user.id.clone(),
        }
    }

    pub fn log_created(&self) {
        info!(
            event = "idler_created",
            component = "user-idler",
            username = %self.username,
            user_id = %self.user_id,
            "UserIdler created"
        );
    }

    pub fn log_started(&self, check_idle: Duration, quiet_interval: Duration) {
        info!(
            event = "idler_started",
            component = "user-idler",
            username = %self.username,
            user_id = %self.user_id,
            check_idle_secs = check_idle.as_secs(),
            max_retries_quiet_interval_secs = quiet_interval.as_secs(),
            "UserIdler started"
        );
    }

    pub fn log_shutdown(&self) {
        info!(
            event = "idler_shutdown",
            component = "user-idler",
            username = %self.username,
            user_id = %self.user_id,
            "Shutting down user idler"
        );
    }

    pub fn log_user_received(&self, user: &User) {
        debug!(
            event = "user_received",
            username = %self.username,
            user_id = %self.user_id,
            state = %user,
            "Received user data"
        );
    }

    pub fn log_timer_check(&self, user: &User) {
        info!(
            event = "timer_check",
            username = %self.username,
            user_id = %self.user_id,
            state = %user,
            "Time based idle check"
        );
    }

    pub fn log_evaluation(&self, active: bool) {
        debug!(
            event = "conditions_evaluated",
            username = %self.username,
            user_id = %self.user_id,
            active = active,
            "Check idle state"
        );
    }

    pub fn log_toggle(&self, enabled: bool) {
        debug!(
            event = "toggle_checked",
            username = %self.username,
            user_id = %self.user_id,
            enabled = enabled,
            "Idler toggle evaluated"
        );
    }

    pub fn log_check_failed(
        &self,
        error: &dyn std::fmt::Display,
        idle_attempts: u32,
        unidle_attempts: u32,
    ) {
        warn!(
            event = "check_failed",
            username = %self.username,
            user_id = %self.user_id,
            error = %error,
            idle_attempts = idle_attempts,
            unidle_attempts = unidle_attempts,
            "Error during idle check"
        );
    }

    pub fn log_retry_exhausted(&self, action: &str, attempts: u32, max_retries: u32) {
        warn!(
            event = "retry_budget_exhausted",
            username = %self.username,
            user_id = %self.user_id,
            action = %action,
            attempts = attempts,
            max_retries = max_retries,
            "Skipping request since max retry count has been reached"
        );
    }

    pub fn log_action(&self, action: &str, service: &str, attempt: u32, max_retries: u32) {
        info!(
            event = "actuation",
            username = %self.username,
            user_id = %self.user_id,
            action = %action,
            service = %service,
            attempt = %format!("({}/{})", attempt, max_retries),
            "About to {} {}", action, service
        );
    }

    pub fn log_counters_reset(&self, idle_attempts: u32, unidle_attempts: u32) {
        debug!(
            event = "counters_reset",
            username = %self.username,
            user_id = %self.user_id,
            idle_attempts = idle_attempts,
            unidle_attempts = unidle_attempts,
            "Resetting retry counters"
        );
    }
}
