//! Aggregation of named conditions into one verdict

use super::{Condition, MultiError};
use crate::models::User;
use tracing::debug;

/// Named set of conditions evaluated together.
///
/// Built once when an idler is created and not mutated afterwards.
#[derive(Default)]
pub struct Conditions {
    conditions: Vec<(String, Box<dyn Condition>)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition under `name`.
    ///
    /// Registering a name twice replaces the earlier condition in place.
    pub fn add(&mut self, name: impl Into<String>, condition: impl Condition + 'static) {
        let name = name.into();
        let condition: Box<dyn Condition> = Box::new(condition);

        match self.conditions.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = condition,
            None => self.conditions.push((name, condition)),
        }
    }

    /// Evaluate every condition against the same snapshot.
    ///
    /// The result is true if any condition that evaluated cleanly reports
    /// activity. Failing conditions do not take part in the vote; each one
    /// contributes an entry to the returned [`MultiError`].
    pub async fn eval(&self, user: &User) -> (bool, MultiError) {
        let mut active = false;
        let mut errors = MultiError::new();

        for (name, condition) in &self.conditions {
            match condition.eval(user).await {
                Ok(result) => {
                    debug!(condition = %name, active = result, "Condition evaluated");
                    active |= result;
                }
                Err(e) => {
                    debug!(condition = %name, error = %e, "Condition failed");
                    errors.push(name.clone(), e);
                }
            }
        }

        (active, errors)
    }

    /// Names of registered conditions, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
