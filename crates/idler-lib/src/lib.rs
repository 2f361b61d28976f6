//! Jenkins idler library
//!
//! This crate provides the core functionality for:
//! - Activity conditions and their aggregation
//! - The per-user idle/unidle control loop
//! - The OpenShift idle API boundary
//! - Feature toggles
//! - Metrics and structured logging

pub mod condition;
pub mod error;
pub mod idler;
pub mod models;
pub mod observability;
pub mod openshift;
pub mod toggles;

pub use error::{DispatchError, IdlerError};
pub use idler::{IdlerConfig, IdlerSupervisor, UserIdler};
pub use models::*;
pub use observability::{IdlerMetrics, StructuredLogger};
