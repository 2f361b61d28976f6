//! Per-user idle control loop
//!
//! One `UserIdler` runs per monitored user. It keeps the latest snapshot of
//! the user's namespace, evaluates the activity conditions whenever a new
//! snapshot arrives or the check timer fires, and idles or unidles the
//! Jenkins services accordingly. Idle and unidle attempts are capped at
//! `max_retries` and the counters are zeroed every quiet interval.

use super::IdlerConfig;
use crate::condition::{create_watch_conditions, Conditions};
use crate::error::IdlerError;
use crate::models::{JenkinsState, User, JENKINS_SERVICES, JENKINS_SERVICE_NAME};
use crate::observability::{IdlerMetrics, StructuredLogger};
use crate::openshift::OpenShiftClient;
use crate::toggles::Features;
use anyhow::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Capacity of the inbound user event queue
pub const USER_CHANNEL_CAPACITY: usize = 10;

/// Action applied to the Jenkins services of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Idle,
    Unidle,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::Idle => "idle",
            Action::Unidle => "unidle",
        }
    }
}

/// Idle controller for a single user
pub struct UserIdler {
    openshift_api: String,
    openshift_bearer_token: String,
    openshift_client: Arc<dyn OpenShiftClient>,
    features: Arc<dyn Features>,
    conditions: Conditions,
    max_retries: u32,
    idle_attempts: u32,
    unidle_attempts: u32,
    user: User,
    user_tx: mpsc::Sender<User>,
    user_rx: mpsc::Receiver<User>,
    logger: StructuredLogger,
    metrics: IdlerMetrics,
}

impl UserIdler {
    /// Create an idler watching the standard condition set.
    ///
    /// `proxy_client` is the HTTP client shared by every proxy condition.
    pub fn new(
        user: User,
        openshift_api: impl Into<String>,
        openshift_bearer_token: impl Into<String>,
        config: &IdlerConfig,
        proxy_client: &Client,
        openshift_client: Arc<dyn OpenShiftClient>,
        features: Arc<dyn Features>,
    ) -> Result<Self> {
        let conditions = create_watch_conditions(
            proxy_client,
            config.proxy_url.as_deref(),
            config.idle_after,
        )?;

        Ok(Self::with_conditions(
            user,
            openshift_api,
            openshift_bearer_token,
            config.max_retries,
            conditions,
            openshift_client,
            features,
        ))
    }

    /// Create an idler with an explicit condition set
    pub fn with_conditions(
        user: User,
        openshift_api: impl Into<String>,
        openshift_bearer_token: impl Into<String>,
        max_retries: u32,
        conditions: Conditions,
        openshift_client: Arc<dyn OpenShiftClient>,
        features: Arc<dyn Features>,
    ) -> Self {
        let logger = StructuredLogger::for_user(&user);
        logger.log_created();

        let (user_tx, user_rx) = mpsc::channel(USER_CHANNEL_CAPACITY);

        Self {
            openshift_api: openshift_api.into(),
            openshift_bearer_token: openshift_bearer_token.into(),
            openshift_client,
            features,
            conditions,
            max_retries,
            idle_attempts: 0,
            unidle_attempts: 0,
            user,
            user_tx,
            user_rx,
            logger,
            metrics: IdlerMetrics::new(),
        }
    }

    /// Latest user snapshot
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Sender side of the inbound user queue
    pub fn sender(&self) -> mpsc::Sender<User> {
        self.user_tx.clone()
    }

    pub fn idle_attempts(&self) -> u32 {
        self.idle_attempts
    }

    pub fn unidle_attempts(&self) -> u32 {
        self.unidle_attempts
    }

    /// Start the control loop on `tracker`.
    ///
    /// The loop stops once `ctx` is cancelled and then cancels `cancel` so
    /// that whoever owns it can shut down the remaining idlers.
    pub fn run(
        self,
        ctx: CancellationToken,
        tracker: &TaskTracker,
        cancel: CancellationToken,
        check_idle: Duration,
        max_retries_quiet_interval: Duration,
    ) -> JoinHandle<()> {
        self.logger.log_started(check_idle, max_retries_quiet_interval);
        tracker.spawn(self.run_loop(ctx, cancel, check_idle, max_retries_quiet_interval))
    }

    async fn run_loop(
        mut self,
        ctx: CancellationToken,
        cancel: CancellationToken,
        check_idle: Duration,
        quiet_interval: Duration,
    ) {
        let timer = sleep(check_idle);
        tokio::pin!(timer);

        let mut ticker = interval_at(Instant::now() + quiet_interval, quiet_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = ctx.cancelled() => {
                    self.logger.log_shutdown();
                    cancel.cancel();
                    return;
                }
                Some(user) = self.user_rx.recv() => {
                    self.user = user;
                    self.logger.log_user_received(&self.user);
                    self.check_and_log().await;
                    // A fresh event supersedes the pending time based check
                    timer.as_mut().reset(Instant::now() + check_idle);
                }
                _ = &mut timer => {
                    // No events for a whole check period; idle namespaces produce none
                    self.logger.log_timer_check(&self.user);
                    self.check_and_log().await;
                    timer.as_mut().reset(Instant::now() + check_idle);
                }
                _ = ticker.tick() => {
                    self.reset_counters();
                }
            }
        }
    }

    async fn check_and_log(&mut self) {
        let start = Instant::now();
        let result = self.check_idle().await;
        self.metrics.observe_check_latency(start.elapsed());

        if let Err(e) = result {
            self.metrics.inc_check_error(e.as_label());
            self.logger
                .log_check_failed(&e, self.idle_attempts, self.unidle_attempts);
        }
    }

    /// Run one evaluation cycle.
    ///
    /// Evaluates the conditions and, depending on the verdict, unidles an
    /// active namespace or idles an inactive one. Any condition error aborts
    /// the cycle before the cluster is touched.
    pub async fn check_idle(&mut self) -> Result<(), IdlerError> {
        let (active, errors) = self.conditions.eval(&self.user).await;
        errors.into_result().map_err(IdlerError::Conditions)?;

        self.logger.log_evaluation(active);

        if active {
            return self.do_unidle().await;
        }

        if self.is_idler_enabled().await? {
            self.do_idle().await?;
        }

        Ok(())
    }

    async fn do_idle(&mut self) -> Result<(), IdlerError> {
        if self.idle_attempts >= self.max_retries {
            self.metrics.inc_retry_budget_exhausted(Action::Idle.as_str());
            self.logger
                .log_retry_exhausted(Action::Idle.as_str(), self.idle_attempts, self.max_retries);
            return Ok(());
        }

        let state = self.jenkins_state().await?;
        if state > JenkinsState::Idled {
            self.idle_attempts += 1;
            self.apply(Action::Idle, self.idle_attempts).await?;
        }

        Ok(())
    }

    async fn do_unidle(&mut self) -> Result<(), IdlerError> {
        if self.unidle_attempts >= self.max_retries {
            self.metrics.inc_retry_budget_exhausted(Action::Unidle.as_str());
            self.logger.log_retry_exhausted(
                Action::Unidle.as_str(),
                self.unidle_attempts,
                self.max_retries,
            );
            return Ok(());
        }

        let state = self.jenkins_state().await?;
        if state == JenkinsState::Idled {
            self.unidle_attempts += 1;
            self.apply(Action::Unidle, self.unidle_attempts).await?;
        }

        Ok(())
    }

    /// Apply `action` to every Jenkins service in order.
    ///
    /// Stops at the first failure; services already handled stay as they are.
    async fn apply(&self, action: Action, attempt: u32) -> Result<(), IdlerError> {
        let namespace = self.user.namespace();

        for service in JENKINS_SERVICES {
            self.logger
                .log_action(action.as_str(), service, attempt, self.max_retries);

            let result = match action {
                Action::Idle => {
                    self.openshift_client
                        .idle(
                            &self.openshift_api,
                            &self.openshift_bearer_token,
                            &namespace,
                            service,
                        )
                        .await
                }
                Action::Unidle => {
                    self.openshift_client
                        .unidle(
                            &self.openshift_api,
                            &self.openshift_bearer_token,
                            &namespace,
                            service,
                        )
                        .await
                }
            };

            self.metrics.inc_actuation(action.as_str(), result.is_ok());
            result.map_err(|source| IdlerError::Actuation {
                action: action.as_str(),
                service: service.to_string(),
                source,
            })?;
        }

        Ok(())
    }

    async fn is_idler_enabled(&self) -> Result<bool, IdlerError> {
        let enabled = self
            .features
            .is_idler_enabled(&self.user.id)
            .await
            .map_err(IdlerError::Toggle)?;

        self.logger.log_toggle(enabled);
        Ok(enabled)
    }

    async fn jenkins_state(&self) -> Result<JenkinsState, IdlerError> {
        let namespace = self.user.namespace();

        self.openshift_client
            .is_idle(
                &self.openshift_api,
                &self.openshift_bearer_token,
                &namespace,
                JENKINS_SERVICE_NAME,
            )
            .await
            .map_err(|source| IdlerError::StateQuery {
                namespace: self.user.namespace(),
                source,
            })
    }

    /// Zero both retry counters
    pub(crate) fn reset_counters(&mut self) {
        self.logger
            .log_counters_reset(self.idle_attempts, self.unidle_attempts);
        self.idle_attempts = 0;
        self.unidle_attempts = 0;
    }
}
