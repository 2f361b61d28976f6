//! Ownership of one user idler per monitored user

use super::{IdlerConfig, UserIdler};
use crate::condition::UserCondition;
use crate::error::DispatchError;
use crate::models::User;
use crate::observability::IdlerMetrics;
use crate::openshift::OpenShiftClient;
use crate::toggles::Features;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Creates user idlers on demand and routes user events to them
pub struct IdlerSupervisor {
    openshift_api: String,
    openshift_bearer_token: String,
    config: IdlerConfig,
    proxy_client: Client,
    openshift_client: Arc<dyn OpenShiftClient>,
    features: Arc<dyn Features>,
    /// Map of user id -> inbound queue of that user's idler
    idlers: Arc<DashMap<String, mpsc::Sender<User>>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    metrics: IdlerMetrics,
}

impl IdlerSupervisor {
    pub fn new(
        openshift_api: impl Into<String>,
        openshift_bearer_token: impl Into<String>,
        config: IdlerConfig,
        openshift_client: Arc<dyn OpenShiftClient>,
        features: Arc<dyn Features>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            openshift_api: openshift_api.into(),
            openshift_bearer_token: openshift_bearer_token.into(),
            config,
            proxy_client: UserCondition::http_client()?,
            openshift_client,
            features,
            idlers: Arc::new(DashMap::new()),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            metrics: IdlerMetrics::new(),
        })
    }

    /// Token cancelled when the supervisor, or any of its idlers, shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Hand a user snapshot to its idler, starting one on first sight.
    ///
    /// Never blocks: a full queue drops the event and reports back-pressure.
    pub fn dispatch(&self, user: User) -> Result<(), DispatchError> {
        if self.shutdown.is_cancelled() {
            return Err(DispatchError::ShuttingDown);
        }

        let user_id = user.id.clone();
        let mut created = false;

        let sender = match self.idlers.entry(user_id.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let idler = UserIdler::new(
                    user.clone(),
                    self.openshift_api.clone(),
                    self.openshift_bearer_token.clone(),
                    &self.config,
                    &self.proxy_client,
                    self.openshift_client.clone(),
                    self.features.clone(),
                )
                .map_err(|source| DispatchError::Create {
                    user: user_id.clone(),
                    source,
                })?;

                let sender = idler.sender();
                let handle = idler.run(
                    self.shutdown.child_token(),
                    &self.tracker,
                    self.shutdown.clone(),
                    self.config.check_idle,
                    self.config.max_retries_quiet_interval,
                );
                self.untrack_on_exit(user_id.clone(), sender.clone(), handle);
                entry.insert(sender.clone());
                created = true;
                sender
            }
        };

        // Entry guard is released; safe to take the map length now
        if created {
            self.metrics.set_idlers_running(self.idlers.len() as i64);
            info!(user_id = %user_id, username = %user.name, "Started user idler");
        }

        match sender.try_send(user) {
            Ok(()) => {
                debug!(user_id = %user_id, "Dispatched user event");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.inc_events_dropped();
                warn!(user_id = %user_id, "User idler queue full, dropping event");
                Err(DispatchError::QueueFull(user_id))
            }
            Err(TrySendError::Closed(_)) => {
                self.idlers
                    .remove_if(&user_id, |_, tx| tx.same_channel(&sender));
                self.metrics.set_idlers_running(self.idlers.len() as i64);
                Err(DispatchError::Closed(user_id))
            }
        }
    }

    /// Drop the map entry of an idler once its task exits.
    ///
    /// Only the entry still pointing at the exited idler's queue is removed, so
    /// an idler started in its place for the same user survives.
    fn untrack_on_exit(
        &self,
        user_id: String,
        sender: mpsc::Sender<User>,
        handle: JoinHandle<()>,
    ) {
        let idlers = self.idlers.clone();
        let metrics = self.metrics.clone();

        self.tracker.spawn(async move {
            if let Err(e) = handle.await {
                warn!(user_id = %user_id, error = %e, "User idler task failed");
            }
            idlers.remove_if(&user_id, |_, tx| tx.same_channel(&sender));
            metrics.set_idlers_running(idlers.len() as i64);
            debug!(user_id = %user_id, "User idler exited");
        });
    }

    /// Number of tracked users
    pub fn len(&self) -> usize {
        self.idlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idlers.is_empty()
    }

    /// Whether an idler exists for `user_id`
    pub fn contains(&self, user_id: &str) -> bool {
        self.idlers.contains_key(user_id)
    }

    /// Stop every idler and wait for all of them to exit
    pub async fn shutdown(&self) {
        info!(idlers = self.idlers.len(), "Shutting down idler supervisor");

        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        self.idlers.clear();
        self.metrics.set_idlers_running(0);
    }
}
