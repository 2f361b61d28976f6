//! Error types for the idle check cycle

use crate::condition::MultiError;
use thiserror::Error;

/// Reasons a single idle check cycle ended without completing its action.
///
/// None of these terminate a running idler; they are logged and the next
/// cycle starts from scratch.
#[derive(Error, Debug)]
pub enum IdlerError {
    /// One or more conditions could not be evaluated
    #[error("condition evaluation failed: {0}")]
    Conditions(MultiError),

    /// The feature toggle lookup failed
    #[error("feature toggle lookup failed: {0}")]
    Toggle(#[source] anyhow::Error),

    /// The Jenkins state could not be determined
    #[error("unable to query jenkins state for {namespace}: {source}")]
    StateQuery {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },

    /// An idle or unidle call failed; remaining services were not touched
    #[error("{action} of service {service} failed: {source}")]
    Actuation {
        action: &'static str,
        service: String,
        #[source]
        source: anyhow::Error,
    },
}

impl IdlerError {
    /// Short stable label for logs and metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            IdlerError::Conditions(_) => "conditions",
            IdlerError::Toggle(_) => "toggle",
            IdlerError::StateQuery { .. } => "state_query",
            IdlerError::Actuation { .. } => "actuation",
        }
    }
}

/// Reasons a user event could not be handed to its idler
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The idler's queue is full; the event was dropped
    #[error("event queue for user {0} is full")]
    QueueFull(String),

    /// The idler has stopped and no longer accepts events
    #[error("idler for user {0} has stopped")]
    Closed(String),

    /// The supervisor is shutting down
    #[error("supervisor is shutting down")]
    ShuttingDown,

    /// The idler could not be created
    #[error("unable to create idler for user {user}: {source}")]
    Create {
        user: String,
        #[source]
        source: anyhow::Error,
    },
}
